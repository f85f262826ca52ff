pub mod in_memory;
pub mod pagseguro;
pub mod rest;
pub mod zapi;
