use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Run ordtrack against a database inside `dir`.
fn ordtrack(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("ordtrack");
    cmd.current_dir(dir.path()).args(["--db", "ordtrack.db"]);
    cmd
}

fn seed_pending_amendment(dir: &TempDir) {
    ordtrack(dir)
        .args([
            "document",
            "register",
            "--kind",
            "ordinance",
            "--title",
            "Parking ordinance",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("ORD-"));

    ordtrack(dir)
        .args([
            "file",
            "--title",
            "Raise meter rates downtown",
            "--document",
            "1",
            "--submit",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("pending"));
}

#[test]
fn approve_flow_updates_listing_and_audit_trail() {
    let dir = TempDir::new().unwrap();
    seed_pending_amendment(&dir);

    ordtrack(&dir)
        .args(["decide", "1", "approve"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now approved"));

    ordtrack(&dir)
        .args(["list", "--status", "approved"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Raise meter rates downtown"));

    ordtrack(&dir)
        .arg("audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("AMENDMENT_APPROVE"));

    ordtrack(&dir)
        .args(["history", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("approve -> approved"))
        .stdout(predicate::str::contains("signature: clerk (admin) signed"));
}

#[test]
fn reject_requires_comments() {
    let dir = TempDir::new().unwrap();
    seed_pending_amendment(&dir);

    ordtrack(&dir)
        .args(["decide", "1", "reject"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Comments are required"));

    // Nothing changed: the amendment is still in the pending bucket.
    ordtrack(&dir)
        .args(["list", "--status", "pending"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Raise meter rates downtown"));
}

#[test]
fn unknown_action_and_role_are_refused() {
    let dir = TempDir::new().unwrap();
    seed_pending_amendment(&dir);

    ordtrack(&dir)
        .args(["decide", "1", "publish"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown action"));

    ordtrack(&dir)
        .args(["--role", "intern", "decide", "1", "approve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown role"));
}

#[test]
fn double_approval_conflicts() {
    let dir = TempDir::new().unwrap();
    seed_pending_amendment(&dir);

    ordtrack(&dir).args(["decide", "1", "approve"]).assert().success();
    ordtrack(&dir)
        .args(["decide", "1", "approve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot approve"));
}

#[test]
fn votes_show_up_in_listing_tallies() {
    let dir = TempDir::new().unwrap();
    seed_pending_amendment(&dir);

    ordtrack(&dir)
        .args(["vote", "1", "cm.alvarez", "yes"])
        .assert()
        .success();
    ordtrack(&dir)
        .args(["vote", "1", "cm.boone", "no"])
        .assert()
        .success();

    ordtrack(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 yes / 1 no / 2 cast"));
}

#[test]
fn export_writes_dossier_notes() {
    let dir = TempDir::new().unwrap();
    seed_pending_amendment(&dir);

    ordtrack(&dir)
        .args(["decide", "1", "return", "--comments", "fix section 3"])
        .assert()
        .success();

    ordtrack(&dir)
        .args(["export", "--out-dir", "dossiers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 1 dossiers"));

    let index = dir.path().join("dossiers/00_Index/MOC - Amendments.md");
    assert!(index.exists(), "index note should be generated");

    let notes_dir = dir.path().join("dossiers/Amendments");
    let note = std::fs::read_dir(&notes_dir)
        .unwrap()
        .next()
        .expect("one dossier note")
        .unwrap();
    let content = std::fs::read_to_string(note.path()).unwrap();
    assert!(content.contains("fix section 3"));
    assert!(content.contains("status: draft"));
}

#[test]
fn attachments_roundtrip() {
    let dir = TempDir::new().unwrap();
    seed_pending_amendment(&dir);

    std::fs::write(dir.path().join("minutes.txt"), "call to order").unwrap();
    ordtrack(&dir)
        .args(["document", "attach", "1", "minutes.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Attached minutes.txt"));

    ordtrack(&dir)
        .args(["document", "attachments", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("minutes.txt"));

    ordtrack(&dir)
        .args(["document", "detach", "1"])
        .assert()
        .success();

    ordtrack(&dir)
        .args(["document", "attachments", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No attachments."));
}
