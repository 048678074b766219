use std::io::{self, BufRead};

use compass_core::auth::{hash_password, validate_new_password};

/// Run the `hash-password` command: read a password from stdin and print its
/// argon2 hash for `[bootstrap_admin].password_hash`.
pub fn run() -> anyhow::Result<()> {
    eprintln!("Enter password:");
    let hash = hash_from_reader(io::stdin().lock())?;
    println!("{hash}");
    Ok(())
}

fn hash_from_reader<R: BufRead>(mut reader: R) -> anyhow::Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']);
    validate_new_password(password)?;
    Ok(hash_password(password)?)
}
