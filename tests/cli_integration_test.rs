use assert_cmd::Command;
use std::fs;
use tempfile::tempdir;

const DATA_XML: &str = r#"<DISS_submission>
  <DISS_authorship><DISS_author type="primary"><DISS_name>
    <DISS_surname>Doe</DISS_surname><DISS_fname>Jane</DISS_fname>
  </DISS_name></DISS_author></DISS_authorship>
  <DISS_description>
    <DISS_title>Tidal Commerce</DISS_title>
    <DISS_degree>Ph.D.</DISS_degree>
    <DISS_institution><DISS_inst_name>Yale University</DISS_inst_name></DISS_institution>
  </DISS_description>
</DISS_submission>"#;

#[test]
fn test_cli_extract_with_config_file() {
    let dir = tempdir().unwrap();
    let submissions = dir.path().join("extracted_files");
    let sub = submissions.join("upload_5");
    fs::create_dir_all(&sub).unwrap();
    fs::write(sub.join("5_DATA.xml"), DATA_XML).unwrap();
    fs::write(sub.join("5.xml"), "<collection/>").unwrap();
    fs::write(sub.join("5.json"), r#"{"Date of last event": "2021-05-10"}"#).unwrap();

    let output = dir.path().join("upload.csv");
    let config = dir.path().join("config.json");
    fs::write(
        &config,
        serde_json::json!({
            "extracted_file_path": submissions,
            "output_path": output,
            "season": "Fall"
        })
        .to_string(),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("etdprep").unwrap();
    cmd.arg("--config").arg(&config).arg("extract");
    cmd.assert().success();

    let content = fs::read_to_string(&output).unwrap();
    let mut lines = content.lines();
    assert!(lines.next().unwrap().starts_with("title,fulltext_url,keywords,abstract"));
    let row = lines.next().unwrap();
    assert!(row.starts_with("Tidal Commerce,NA,"));
    assert!(row.ends_with(",dissertation,2021-05-10,Fall"));
}

#[test]
fn test_cli_extract_without_input_fails() {
    let mut cmd = Command::cargo_bin("etdprep").unwrap();
    cmd.arg("extract").arg("--output").arg("out.csv");
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("No submission directory given"));
}

#[test]
fn test_cli_split_marc() {
    let dir = tempdir().unwrap();
    let combined = dir.path().join("etd_marc.xml");
    fs::write(
        &combined,
        r#"<collection xmlns="http://www.loc.gov/MARC21/slim">
<record><controlfield tag="001">AAI28000001</controlfield></record>
</collection>"#,
    )
    .unwrap();
    let out = dir.path().join("split");

    let mut cmd = Command::cargo_bin("etdprep").unwrap();
    cmd.arg("split-marc").arg("--input").arg(&combined).arg("--output").arg(&out);
    cmd.assert().success();

    let record = fs::read_to_string(out.join("28000001.xml")).unwrap();
    assert!(record.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(record.contains("<record><controlfield tag=\"001\">AAI28000001</controlfield></record>"));
}
