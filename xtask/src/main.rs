use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context, Error, Result};
use xshell::{cmd, pushd, pushenv};

const USAGE: &str = "\
cargo xtask <task>

TASKS:
    pre-commit                 Format the tree and restage formatted files
    install-pre-commit         Install this binary as the git pre-commit hook
    ci check-fmt|lint|test     One CI step over the whole workspace
    dev-cert                   Self-signed key and certificate in ssl/
";

enum Fmt {
    Write,
    Check,
}

enum CiStep {
    CheckFmt,
    Lint,
    Test,
}

impl FromStr for CiStep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check-fmt" => Ok(CiStep::CheckFmt),
            "lint" => Ok(CiStep::Lint),
            "test" => Ok(CiStep::Test),
            _ => bail!("Unknown CI step: {}\n\n{}", s, USAGE),
        }
    }
}

enum Task {
    PreCommit,
    InstallPreCommit,
    Ci(CiStep),
    DevCert,
}

impl Task {
    fn from_args(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["pre-commit"] => Ok(Task::PreCommit),
            ["install-pre-commit"] => Ok(Task::InstallPreCommit),
            ["ci", step] => Ok(Task::Ci(step.parse()?)),
            ["dev-cert"] => Ok(Task::DevCert),
            _ => bail!("Unexpected arguments {:?}\n\n{}", args, USAGE),
        }
    }
}

fn main() -> Result<()> {
    let mut args = env::args();
    // Installed as .git/hooks/pre-commit, git calls us without a task.
    if args.next().map_or(false, |me| me.contains("pre-commit")) {
        return pre_commit().context("failed to run pre-commit hook");
    }

    let args: Vec<String> = args.collect();
    match Task::from_args(&args)? {
        Task::PreCommit => pre_commit().context("failed to run pre-commit hook"),
        Task::InstallPreCommit => {
            install_pre_commit().context("failed to install pre-commit hook")
        },
        Task::Ci(step) => ci(step),
        Task::DevCert => {
            dev_cert().context("failed to generate development certificate")
        },
    }
}

fn ci(step: CiStep) -> Result<()> {
    let _dir = pushd(project_root()?)?;
    match step {
        CiStep::CheckFmt => rustfmt(Fmt::Check)?,
        CiStep::Lint => {
            cmd!("cargo clippy --workspace --all-targets -- -D warnings").run()?
        },
        CiStep::Test => cmd!("cargo test --workspace --verbose").run()?,
    }
    Ok(())
}

// nfse reads ssl/cert.pem and ssl/key.pem unless configured otherwise. The
// web service rejects this certificate, it only works against a local stub.
fn dev_cert() -> Result<()> {
    let _dir = pushd(project_root()?)?;
    if Path::new("ssl/key.pem").exists() {
        bail!("ssl/key.pem already exists, not overwriting it");
    }
    fs::create_dir_all("ssl")?;
    cmd!("openssl req -x509 -newkey rsa:2048 -nodes -sha256 -days 365 -subj /CN=nfse-dev -keyout ssl/key.pem -out ssl/cert.pem")
        .run()?;
    Ok(())
}

fn pre_commit() -> Result<()> {
    rustfmt(Fmt::Write)?;

    let root = project_root()?;
    let staged = cmd!("git diff --diff-filter=MAR --name-only --cached").read()?;
    for file in staged.lines().map(|line| root.join(line)) {
        cmd!("git update-index --add {file}").run()?;
    }
    Ok(())
}

fn install_pre_commit() -> Result<()> {
    let hook = project_root()?
        .join(".git/hooks")
        .join(format!("pre-commit{}", env::consts::EXE_SUFFIX));
    fs::copy(env::current_exe()?, &hook)
        .with_context(|| format!("failed to copy into {}", hook.display()))?;
    Ok(())
}

fn project_root() -> Result<PathBuf> {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR")
        .unwrap_or_else(|_| env!("CARGO_MANIFEST_DIR").to_owned());
    Path::new(&manifest_dir)
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}

fn rustfmt(mode: Fmt) -> Result<()> {
    let _dir = pushd(project_root()?)?;
    // The import directives in rustfmt.toml are nightly only.
    let _toolchain = pushenv("RUSTUP_TOOLCHAIN", "nightly");

    let version = cmd!("cargo fmt -- --version").read()?;
    if !version.contains("nightly") {
        bail!(
            "rustfmt is not the nightly one, install it with `rustup component \
             add rustfmt --toolchain nightly`"
        );
    }

    let check: &[&str] = match mode {
        Fmt::Write => &[],
        Fmt::Check => &["--", "--check"],
    };
    cmd!("cargo fmt {check...}").run()?;
    Ok(())
}
