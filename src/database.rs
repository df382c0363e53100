use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;
use rand::{thread_rng, Rng};

use crate::{
    logger,
    shell::{Executor, ShellCommand},
};

/// Generates a password with upper-case letters, lower-case letters and digits.
pub fn generate_password(length: usize) -> Result<String> {
    if length < 8 {
        bail!("Password length must be at least 8 characters");
    }

    let mut rng = thread_rng();
    loop {
        let password: String = (0..length)
            .map(|_| match rng.gen_range(0..3) {
                0 => rng.gen_range(b'A'..=b'Z') as char,
                1 => rng.gen_range(b'a'..=b'z') as char,
                _ => rng.gen_range(b'0'..=b'9') as char,
            })
            .collect();

        let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());

        if has_upper && has_lower && has_digit {
            return Ok(password);
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

pub fn create_sql(name: &str, password: &str) -> String {
    format!(
        "CREATE USER IF NOT EXISTS {user}@'localhost' IDENTIFIED BY {password}; \
         CREATE DATABASE IF NOT EXISTS {db}; \
         GRANT ALL PRIVILEGES ON {db}.* TO {user}@'localhost'; \
         FLUSH PRIVILEGES;",
        user = quote_literal(name),
        password = quote_literal(password),
        db = quote_ident(name)
    )
}

pub fn drop_sql(name: &str) -> String {
    format!(
        "DROP DATABASE IF EXISTS {db}; DROP USER IF EXISTS {user}@'localhost'; FLUSH PRIVILEGES;",
        db = quote_ident(name),
        user = quote_literal(name)
    )
}

/// Creates a MySQL user and a database of the same name.
pub async fn create_user_and_database(exec: &dyn Executor, name: &str, password: &str) -> Result<()> {
    info!("Creating MySQL user and database '{}'", name);

    exec.run_checked(&ShellCommand::root("mysql", ["-e".to_string(), create_sql(name, password)]))
        .await
        .with_context(|| format!("Failed to create MySQL user or database '{}'", name))?;

    logger::success(&format!("MySQL user and database '{}' created", name));
    Ok(())
}

pub async fn drop_user_and_database(exec: &dyn Executor, name: &str) -> Result<()> {
    info!("Dropping MySQL user and database: {}", name);

    exec.run_checked(&ShellCommand::root("mysql", ["-e".to_string(), drop_sql(name)]))
        .await
        .with_context(|| format!("Failed to drop MySQL user or database '{}'", name))?;

    Ok(())
}

/// Writes an SQL dump of `database` to `file`.
pub async fn dump(exec: &dyn Executor, database: &str, file: &Path) -> Result<()> {
    info!("Dumping MySQL database {}", database);

    exec.run_checked(&ShellCommand::root("mysqldump", [database]).stdout_file(file))
        .await
        .with_context(|| format!("Failed to dump database '{}'", database))?;

    Ok(())
}

/// Feeds an SQL file into `database`.
pub async fn import(exec: &dyn Executor, database: &str, file: &Path) -> Result<()> {
    info!("Importing {:?} into MySQL database {}", file, database);

    exec.run_checked(&ShellCommand::root("mysql", [database]).stdin_file(file))
        .await
        .with_context(|| format!("Failed to import {:?} into '{}'", file, database))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_password_mixes_character_classes() {
        let password = generate_password(16).unwrap();
        assert_eq!(password.len(), 16);
        assert!(password.chars().any(|c| c.is_ascii_uppercase()));
        assert!(password.chars().any(|c| c.is_ascii_lowercase()));
        assert!(password.chars().any(|c| c.is_ascii_digit()));
        assert!(generate_password(4).is_err());
    }

    #[test]
    fn identifiers_with_dashes_are_quoted() {
        let sql = create_sql("my-shop", "S3cret'x");
        assert!(sql.contains("CREATE DATABASE IF NOT EXISTS `my-shop`;"));
        assert!(sql.contains("GRANT ALL PRIVILEGES ON `my-shop`.* TO 'my-shop'@'localhost';"));
        assert!(sql.contains("IDENTIFIED BY 'S3cret\\'x';"));

        assert_eq!(
            drop_sql("blog"),
            "DROP DATABASE IF EXISTS `blog`; DROP USER IF EXISTS 'blog'@'localhost'; FLUSH PRIVILEGES;"
        );
    }
}
