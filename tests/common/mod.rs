#![allow(dead_code)]

use rand::Rng;
use std::io::Error;
use std::path::Path;

pub const HEADER: [&str; 14] = [
    "type",
    "student",
    "guardian",
    "name",
    "phone",
    "cpf",
    "grade",
    "period",
    "model",
    "limit",
    "quantity",
    "amount",
    "role",
    "description",
];

/// A row with only the given columns set.
pub fn row(pairs: &[(&str, &str)]) -> Vec<String> {
    HEADER
        .iter()
        .map(|column| {
            pairs
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, value)| value.to_string())
                .unwrap_or_default()
        })
        .collect()
}

pub fn write_operations(path: &Path, rows: &[Vec<String>]) -> Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(HEADER)?;
    for record in rows {
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// One guardian, `students` prepaid students and `purchases` random sales spread across them.
pub fn generate_operations(path: &Path, students: usize, purchases: usize) -> Result<(), Error> {
    let mut rng = rand::thread_rng();
    let mut rows = vec![row(&[
        ("type", "guardian"),
        ("guardian", "g1"),
        ("name", "Maria Souza"),
        ("phone", "11987654321"),
        ("cpf", "123.456.789-09"),
    ])];

    for s in 1..=students {
        let key = format!("s{s}");
        rows.push(row(&[
            ("type", "student"),
            ("student", &key),
            ("guardian", "g1"),
            ("name", "Aluno"),
            ("grade", "5A"),
            ("model", "prepaid"),
        ]));
        rows.push(row(&[
            ("type", "adjust"),
            ("student", &key),
            ("amount", "100"),
            ("role", "admin"),
        ]));
    }

    for _ in 0..purchases {
        let key = format!("s{}", rng.gen_range(1..=students));
        let quantity = rng.gen_range(1..4).to_string();
        let price = format!("{}.{:02}", rng.gen_range(0..10), rng.gen_range(0..100));
        rows.push(row(&[
            ("type", "purchase"),
            ("student", &key),
            ("quantity", &quantity),
            ("amount", &price),
        ]));
    }

    write_operations(path, &rows)
}
