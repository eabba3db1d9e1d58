use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_chunkdelta").to_string()
}

fn sample(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(2_654_435_761).rotate_left(seed as u32) as u8 ^ seed)
        .collect()
}

#[test]
fn cli_signature_delta_patch_roundtrip() {
    let dir = tempdir().unwrap();
    let basis = dir.path().join("basis.bin");
    let new = dir.path().join("new.bin");
    let sig = dir.path().join("basis.octosig");
    let delta = dir.path().join("new.octodelta");
    let output = dir.path().join("output.bin");

    let basis_data = sample(50_000, 3);
    let mut new_data = basis_data.clone();
    new_data.splice(20_000..20_000, b"inserted by the test".iter().copied());
    std::fs::write(&basis, &basis_data).unwrap();
    std::fs::write(&new, &new_data).unwrap();

    let st = Command::new(bin())
        .args(["signature", "--chunk-size", "1K"])
        .arg(&basis)
        .arg(&sig)
        .status()
        .unwrap();
    assert!(st.success());

    let st = Command::new(bin())
        .arg("delta")
        .arg(&sig)
        .arg(&new)
        .arg(&delta)
        .status()
        .unwrap();
    assert!(st.success());
    assert!(std::fs::metadata(&delta).unwrap().len() < 5_000);

    let st = Command::new(bin())
        .arg("patch")
        .arg(&basis)
        .arg(&delta)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), new_data);
}

#[test]
fn cli_refuses_to_overwrite_without_force() {
    let dir = tempdir().unwrap();
    let basis = dir.path().join("basis.bin");
    let sig = dir.path().join("basis.sig");
    std::fs::write(&basis, b"some basis bytes").unwrap();
    std::fs::write(&sig, b"existing").unwrap();

    let st = Command::new(bin())
        .arg("signature")
        .arg(&basis)
        .arg(&sig)
        .status()
        .unwrap();
    assert!(!st.success());
    assert_eq!(std::fs::read(&sig).unwrap(), b"existing");

    let st = Command::new(bin())
        .args(["--force", "signature"])
        .arg(&basis)
        .arg(&sig)
        .status()
        .unwrap();
    assert!(st.success());
    assert!(std::fs::read(&sig).unwrap().starts_with(b"OCTOSIG"));
}

#[test]
fn cli_rejects_out_of_range_chunk_size() {
    let dir = tempdir().unwrap();
    let basis = dir.path().join("basis.bin");
    let sig = dir.path().join("basis.sig");
    std::fs::write(&basis, b"abc").unwrap();

    let out = Command::new(bin())
        .args(["signature", "--chunk-size", "64"])
        .arg(&basis)
        .arg(&sig)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("chunk size 64"));
    assert!(!sig.exists());
}

#[test]
fn cli_patch_detects_changed_basis() {
    let dir = tempdir().unwrap();
    let basis = dir.path().join("basis.bin");
    let sig = dir.path().join("sig");
    let delta = dir.path().join("delta");
    let output = dir.path().join("out");

    let data = sample(8192, 5);
    std::fs::write(&basis, &data).unwrap();
    for args in [
        vec![basis.clone(), sig.clone()],
        vec![sig.clone(), basis.clone(), delta.clone()],
    ] {
        let cmd = if args.len() == 2 { "signature" } else { "delta" };
        let st = Command::new(bin()).arg(cmd).args(&args).status().unwrap();
        assert!(st.success());
    }

    let mut tampered = data.clone();
    tampered[10] ^= 0x80;
    std::fs::write(&basis, &tampered).unwrap();

    let out = Command::new(bin())
        .arg("patch")
        .arg(&basis)
        .arg(&delta)
        .arg(&output)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("verification"));

    let st = Command::new(bin())
        .args(["--force", "patch", "--skip-verification"])
        .arg(&basis)
        .arg(&delta)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), tampered);
}

#[test]
fn cli_json_stats_on_stderr() {
    let dir = tempdir().unwrap();
    let basis = dir.path().join("basis.bin");
    let sig = dir.path().join("sig");
    std::fs::write(&basis, vec![7u8; 5000]).unwrap();

    let out = Command::new(bin())
        .args(["--json", "signature"])
        .arg(&basis)
        .arg(&sig)
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(json["command"], "signature");
    assert_eq!(json["basis_size"], 5000);
    assert_eq!(json["chunks"], 3);
    assert_eq!(json["hash"], "SHA1");
}

#[test]
fn cli_explain_lists_commands() {
    let dir = tempdir().unwrap();
    let basis = dir.path().join("basis.bin");
    let new = dir.path().join("new.bin");
    let sig = dir.path().join("sig");
    let delta = dir.path().join("delta");

    let basis_data = vec![0x41u8; 4096];
    let mut new_data = basis_data.clone();
    new_data.extend_from_slice(&[0x42; 10]);
    std::fs::write(&basis, &basis_data).unwrap();
    std::fs::write(&new, &new_data).unwrap();

    assert!(Command::new(bin()).arg("signature").arg(&basis).arg(&sig).status().unwrap().success());
    assert!(
        Command::new(bin())
            .args(["delta", "--no-aggregate"])
            .arg(&sig)
            .arg(&new)
            .arg(&delta)
            .status()
            .unwrap()
            .success()
    );

    let out = Command::new(bin()).args(["-v", "explain"]).arg(&delta).output().unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert_eq!(text.matches("COPY").count(), 2);
    assert_eq!(text.matches("DATA").count(), 1);
    assert!(text.contains("output size:      4106"));
}

#[test]
fn cli_explain_rejects_non_delta() {
    let dir = tempdir().unwrap();
    let junk = dir.path().join("junk");
    std::fs::write(&junk, b"definitely not a delta").unwrap();
    let out = Command::new(bin()).arg("explain").arg(&junk).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("corrupt"));
}

#[test]
fn cli_progress_prints_percentages() {
    let dir = tempdir().unwrap();
    let basis = dir.path().join("basis.bin");
    let sig = dir.path().join("sig");
    std::fs::write(&basis, sample(10_000, 9)).unwrap();

    let out = Command::new(bin())
        .args(["--progress", "signature"])
        .arg(&basis)
        .arg(&sig)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Building signatures: 0%"));
    assert!(stderr.contains("Building signatures: 100%"));
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("DEFAULT_CHUNK_SIZE=2048"));
}
