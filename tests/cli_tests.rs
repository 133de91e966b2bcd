//! Command-line tests for the `tabload` binary

#[cfg(test)]
mod cli_tests {
    use assert_cmd::Command;
    use rusqlite::Connection;
    use std::fs;
    use tempfile::TempDir;

    fn stdout_of(output: &std::process::Output) -> String {
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    fn stderr_of(output: &std::process::Output) -> String {
        String::from_utf8_lossy(&output.stderr).to_string()
    }

    #[test]
    fn test_help() {
        let output = Command::cargo_bin("tabload").unwrap().arg("--help").output().unwrap();
        assert!(output.status.success());
        assert!(stdout_of(&output).contains("Usage: tabload [CONFIG]"));
    }

    #[test]
    fn test_too_many_arguments() {
        let output = Command::cargo_bin("tabload")
            .unwrap()
            .args(["a.toml", "b.toml"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_missing_config_file() {
        let output = Command::cargo_bin("tabload")
            .unwrap()
            .arg("/nonexistent/tabload.toml")
            .output()
            .unwrap();
        assert!(!output.status.success());
        assert!(stderr_of(&output).contains("Failed to load configuration"));
    }

    #[test]
    fn test_csv_load_into_sqlite() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("people.csv"), "id,name,city\n1,Ana,Recife\n2,Rui,Natal\n").unwrap();
        fs::write(
            dir.path().join("load.toml"),
            r#"
[database]
driver = "sqlite"
path = "people.db"

[source]
kind = "csv"
path = "people.csv"
columns = ["name", "id"]

[target]
table = "people"
types = ["TEXT NOT NULL", "INTEGER"]
"#,
        )
        .unwrap();

        let output = Command::cargo_bin("tabload")
            .unwrap()
            .arg(dir.path().join("load.toml"))
            .output()
            .unwrap();
        assert!(output.status.success(), "stderr: {}", stderr_of(&output));
        assert!(stdout_of(&output).contains("Inserted 2 of 2 rows into people"));

        let conn = Connection::open(dir.path().join("people.db")).unwrap();
        let (name, id): (String, i64) = conn
            .query_row("SELECT name, id FROM people ORDER BY rowid LIMIT 1", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!((name.as_str(), id), ("Ana", 1));
    }

    #[test]
    fn test_unreachable_postgres_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("rows.csv"), "a\n1\n").unwrap();
        fs::write(
            dir.path().join("load.toml"),
            r#"
[database]
name = "staging"
host = "127.0.0.1"
port = 1
password = "x"

[source]
kind = "csv"
path = "rows.csv"

[target]
table = "t"
types = ["INTEGER"]
"#,
        )
        .unwrap();

        let output = Command::cargo_bin("tabload")
            .unwrap()
            .arg(dir.path().join("load.toml"))
            .output()
            .unwrap();
        assert!(!output.status.success());
        assert!(stderr_of(&output).contains("Connection error"));
    }
}
