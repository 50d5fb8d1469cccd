use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const PACKER: &str = env!("CARGO_BIN_EXE_dir2exe");
const LOADER: &str = env!("CARGO_BIN_EXE_dir2exe-loader");

struct TestDir {
    tmpdir: tempfile::TempDir,
}

impl TestDir {
    fn new() -> io::Result<TestDir> {
        let tmp = TestDir {
            tmpdir: tempfile::tempdir()?,
        };
        fs::create_dir(tmp.dir("pack"))?;
        fs::write(tmp.file("pack/data.txt"), b"data")?;
        fs::write(tmp.file("main"), b"main program")?;
        Ok(tmp)
    }

    fn dir(&self, path: impl AsRef<Path>) -> PathBuf {
        self.tmpdir.path().join(path)
    }

    fn file(&self, path: impl AsRef<Path>) -> PathBuf {
        self.tmpdir.path().join(path)
    }

    fn packer(&self, args: &[&Path]) -> io::Result<Output> {
        Command::new(PACKER)
            .args(args)
            .env_remove("DIR2EXE_LOADER")
            .output()
    }

    /// Pack `pack` and `main` into `output` with the given stub
    fn pack(&self, loader: &Path, output: &Path) -> io::Result<Output> {
        self.packer(&[
            Path::new("--loader"),
            loader,
            &self.dir("pack"),
            &self.file("main"),
            output,
        ])
    }
}

#[test]
fn pack_and_list() -> Result<(), Box<dyn Error>> {
    let tmp = TestDir::new()?;

    let output = tmp.pack(Path::new(LOADER), &tmp.file("out"))?;
    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Successfully created"));
    assert!(tmp.file("out").is_file());

    let output = tmp.packer(&[Path::new("list"), &tmp.file("out")])?;
    assert_eq!(output.status.code(), Some(0), "{:?}", output);
    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<Vec<&str>> = stdout
        .lines()
        .map(|line| line.split('\t').collect())
        .collect();
    assert_eq!(lines.len(), 2, "{}", stdout);
    assert_eq!(lines[0][0], "data.txt");
    assert_eq!(lines[0][2], "4");
    assert_eq!(lines[0][3], "-");
    assert_eq!(lines[1][0], "main");
    assert_eq!(lines[1][2], "12");
    assert_eq!(lines[1][3], "x");
    Ok(())
}

#[test]
fn usage_error() -> Result<(), Box<dyn Error>> {
    let tmp = TestDir::new()?;

    let output = tmp.packer(&[])?;
    assert_eq!(output.status.code(), Some(1), "{:?}", output);

    let output = tmp.packer(&[&tmp.dir("pack"), &tmp.file("main")])?;
    assert_eq!(output.status.code(), Some(1), "{:?}", output);

    let output = tmp.packer(&[
        Path::new("--buffer-size"),
        Path::new("0"),
        &tmp.dir("pack"),
        &tmp.file("main"),
        &tmp.file("out"),
    ])?;
    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    assert!(!tmp.file("out").exists());
    Ok(())
}

#[test]
fn empty_loader_stub() -> Result<(), Box<dyn Error>> {
    let tmp = TestDir::new()?;
    fs::write(tmp.file("empty-loader"), b"")?;

    let output = tmp.pack(&tmp.file("empty-loader"), &tmp.file("out"))?;
    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    assert!(!tmp.file("out").exists());
    Ok(())
}

#[test]
fn missing_loader_stub() -> Result<(), Box<dyn Error>> {
    let tmp = TestDir::new()?;

    let output = tmp.pack(&tmp.file("no-loader"), &tmp.file("out"))?;
    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    assert!(!tmp.file("out").exists());
    Ok(())
}

#[test]
fn unwritable_output() -> Result<(), Box<dyn Error>> {
    let tmp = TestDir::new()?;

    let output = tmp.pack(Path::new(LOADER), &tmp.file("no/such/dir/out"))?;
    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    Ok(())
}

#[test]
fn list_rejects_plain_file() -> Result<(), Box<dyn Error>> {
    let tmp = TestDir::new()?;

    let output = tmp.packer(&[Path::new("list"), &tmp.file("main")])?;
    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    Ok(())
}
