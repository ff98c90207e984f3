use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default when no toolkit can be found (CUDA 12.0).
const FALLBACK_VERSION: u32 = 12000;

/// `(cfg name, minimum encoded version)` for native entry points that do not
/// exist in older drivers.
const GATES: &[(&str, u32)] = &[
    ("cuda_launch_kernel", 4000),
    ("cuda_cooperative_launch", 9000),
    ("cuda_launch_ex", 12000),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=STRATOSWARM_CUDA_VERSION");
    println!("cargo:rerun-if-env-changed=CUDA_PATH");
    println!("cargo:rerun-if-env-changed=CUDA_HOME");

    for (name, _) in GATES {
        println!("cargo:rustc-check-cfg=cfg({name})");
    }

    let (version, source) = detect_version();
    println!("cargo:rustc-env=STRATOSWARM_CUDA_VERSION={version}");
    println!("cargo:rustc-env=STRATOSWARM_CUDA_VERSION_SOURCE={source}");

    for (name, minimum) in GATES {
        if version >= *minimum {
            println!("cargo:rustc-cfg={name}");
        }
    }

    if env::var("CARGO_FEATURE_CUDA").is_ok() {
        if let Some(root) = find_cuda_path() {
            println!("cargo:rustc-link-search=native={}", root.join("lib64").display());
            println!("cargo:rustc-link-search=native={}", root.join("lib64/stubs").display());
            println!("cargo:rustc-link-search=native={}", root.join("lib/x64").display());
        }
        println!("cargo:rustc-link-lib=dylib=cuda");
    }
}

/// Resolve the encoded CUDA version (`major * 1000 + minor * 10`).
fn detect_version() -> (u32, &'static str) {
    if let Ok(value) = env::var("STRATOSWARM_CUDA_VERSION") {
        match parse_version(&value) {
            Some(version) => return (version, "env"),
            None => println!(
                "cargo:warning=ignoring unparsable STRATOSWARM_CUDA_VERSION={value}"
            ),
        }
    }

    if let Some(version) = find_cuda_path().and_then(|root| version_from_header(&root)) {
        return (version, "header");
    }

    if let Some(version) = version_from_nvcc() {
        return (version, "nvcc");
    }

    println!(
        "cargo:warning=CUDA toolkit not found - assuming CUDA {}.{}",
        FALLBACK_VERSION / 1000,
        (FALLBACK_VERSION % 1000) / 10
    );
    (FALLBACK_VERSION, "fallback")
}

/// Accepts either the encoded form (`12040`) or a dotted release (`12.4`).
fn parse_version(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Some((major, rest)) = value.split_once('.') {
        let minor = rest.split('.').next()?;
        let major: u32 = major.parse().ok()?;
        let minor: u32 = minor.parse().ok()?;
        return Some(major * 1000 + minor * 10);
    }
    value.parse().ok().filter(|v| *v >= 1000)
}

fn version_from_header(root: &Path) -> Option<u32> {
    let header = fs::read_to_string(root.join("include/cuda.h")).ok()?;
    header.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("#define CUDA_VERSION")?;
        rest.trim().parse().ok()
    })
}

fn version_from_nvcc() -> Option<u32> {
    let output = Command::new("nvcc").arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    // "Cuda compilation tools, release 12.2, V12.2.140"
    let line = stdout.lines().find(|l| l.contains("release"))?;
    let release = line.split("release").nth(1)?.split(',').next()?;
    parse_version(release)
}

fn find_cuda_path() -> Option<PathBuf> {
    for key in ["CUDA_PATH", "CUDA_HOME"] {
        if let Ok(path) = env::var(key) {
            let path = PathBuf::from(path);
            if path.join("include/cuda.h").exists() {
                return Some(path);
            }
        }
    }

    ["/usr/local/cuda", "/opt/cuda"]
        .iter()
        .map(PathBuf::from)
        .find(|path| path.join("include/cuda.h").exists())
}
