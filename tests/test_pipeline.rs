use etdprep::config::PipelineConfig;
use etdprep::fields::Field;
use etdprep::pipeline::{run, run_into};
use etdprep::record::{RecordWriter, COLUMN_COUNT, HEADER};
use etdprep::staging::write_sidecars;
use etdprep::urls::{UrlTable, NOT_AVAILABLE};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const SAMPLE_DATA_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<DISS_submission>
  <DISS_authorship>
    <DISS_author type="primary">
      <DISS_name>
        <DISS_surname>Ramirez</DISS_surname>
        <DISS_fname>Ana</DISS_fname>
        <DISS_middle>L</DISS_middle>
        <DISS_suffix/>
      </DISS_name>
      <DISS_contact>
        <DISS_email>ana.ramirez@example.edu</DISS_email>
      </DISS_contact>
    </DISS_author>
  </DISS_authorship>
  <DISS_description>
    <DISS_title>Sample Thesis</DISS_title>
    <DISS_dates>
      <DISS_comp_date>2021</DISS_comp_date>
      <DISS_accept_date>01/01/2021</DISS_accept_date>
    </DISS_dates>
    <DISS_degree>Ph.D.</DISS_degree>
    <DISS_institution>
      <DISS_inst_code>0265</DISS_inst_code>
      <DISS_inst_name>Yale University</DISS_inst_name>
      <DISS_inst_contact>History</DISS_inst_contact>
    </DISS_institution>
    <DISS_advisor>
      <DISS_name>
        <DISS_surname>Smith</DISS_surname>
        <DISS_fname>John</DISS_fname>
      </DISS_name>
    </DISS_advisor>
    <DISS_cmte_member>
      <DISS_name>
        <DISS_surname>Roe</DISS_surname>
        <DISS_fname>Ann</DISS_fname>
      </DISS_name>
    </DISS_cmte_member>
    <DISS_categorization>
      <DISS_category>
        <DISS_cat_code>0578</DISS_cat_code>
        <DISS_cat_desc>American history</DISS_cat_desc>
      </DISS_category>
      <DISS_keyword>rivers, trade</DISS_keyword>
    </DISS_categorization>
  </DISS_description>
  <DISS_content>
    <DISS_abstract>
      <DISS_para>First paragraph.</DISS_para>
      <DISS_para>Second paragraph.</DISS_para>
    </DISS_abstract>
  </DISS_content>
</DISS_submission>"#;

fn write_submission(root: &Path, dir: &str, id: &str, data_xml: Option<&str>, sidecar: Option<&str>) {
    let dir = root.join(dir);
    fs::create_dir_all(&dir).unwrap();
    if let Some(xml) = data_xml {
        fs::write(dir.join(format!("{}_DATA.xml", id)), xml).unwrap();
    }
    if let Some(json) = sidecar {
        fs::write(dir.join(format!("{}.json", id)), json).unwrap();
    }
    fs::write(dir.join(format!("{}.xml", id)), "<collection/>").unwrap();
    fs::write(dir.join(".DS_Store"), "").unwrap();
}

fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

#[test]
fn test_end_to_end_sample_submission() {
    let dir = tempdir().unwrap();
    let submissions = dir.path().join("extracted_files");
    write_submission(
        &submissions,
        "etdadmin_upload_42",
        "42",
        Some(SAMPLE_DATA_XML),
        Some(r#"{"Date of last event": "2021-01-01", "ID": "42"}"#),
    );

    let url_csv = dir.path().join("urls.csv");
    fs::write(&url_csv, "url\nhttps://example.org/42.pdf\n").unwrap();

    let output = dir.path().join("out.csv");
    let mut config = PipelineConfig::new(&submissions, &output);
    config.url_csv = Some(url_csv);
    config.url_base_prefix = "https://example.org/".to_string();

    let summary = run(&config).unwrap();
    assert_eq!(summary.processed(), 1);
    assert_eq!(summary.incomplete().count(), 0);

    let (headers, rows) = read_rows(&output);
    assert_eq!(headers, HEADER.to_vec());
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    assert_eq!(row.len(), COLUMN_COUNT);
    assert_eq!(row[0], "Sample Thesis");
    assert_eq!(row[1], "https://example.org/42.pdf");
    assert_eq!(row[2], "American history");
    assert_eq!(row[3], "First paragraph.\n\nSecond paragraph.");
    assert_eq!(row[4], "Ana");
    assert_eq!(row[5], "L");
    assert_eq!(row[6], "Ramirez");
    assert_eq!(row[7], "");
    assert_eq!(row[8], "ana.ramirez@example.edu");
    assert_eq!(row[9], "Yale University");
    assert_eq!(row[10], "Smith, John");
    assert!(row[11..15].iter().all(|c| c.is_empty()));
    assert_eq!(row[15], "Ph.D.");
    assert_eq!(row[16], "History");
    assert_eq!(row[17], "dissertation");
    assert_eq!(row[18], "2021-01-01");
    assert_eq!(row[19], "Spring");
}

#[test]
fn test_unknown_identifier_gets_sentinel_url() {
    let dir = tempdir().unwrap();
    write_submission(dir.path(), "a", "7", Some(SAMPLE_DATA_XML), None);

    let config = PipelineConfig::new(dir.path(), dir.path().join("unused.csv"));
    let mut urls = UrlTable::new();
    urls.insert("8".to_string(), "https://example.org/8.pdf".to_string());

    let mut writer = RecordWriter::new(Vec::new(), true).unwrap();
    let summary = run_into(&config, &urls, &mut writer).unwrap();
    assert_eq!(summary.without_url(), 1);

    let bytes = writer.into_inner().unwrap();
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(&row[1], NOT_AVAILABLE);
    // no sidecar: publication date stays empty
    assert_eq!(&row[18], "");
}

#[test]
fn test_bad_submissions_do_not_abort_the_batch() {
    let dir = tempdir().unwrap();
    let submissions = dir.path().join("subs");
    write_submission(&submissions, "a_missing", "1", None, None);
    write_submission(&submissions, "b_broken", "2", Some("<DISS_submission><DISS_description>"), Some("{not json"));
    write_submission(
        &submissions,
        "c_sparse",
        "3",
        Some("<DISS_submission><DISS_description><DISS_title>Only title</DISS_title></DISS_description></DISS_submission>"),
        Some(r#"{"ID": "3"}"#),
    );
    write_submission(&submissions, "d_good", "4", Some(SAMPLE_DATA_XML), None);

    let output = dir.path().join("out.csv");
    let summary = run(&PipelineConfig::new(&submissions, &output)).unwrap();
    assert_eq!(summary.processed(), 4);

    let identifiers: Vec<&str> = summary.outcomes.iter().map(|o| o.identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["1", "2", "3", "4"]);

    let incomplete: Vec<&str> = summary.incomplete().map(|o| o.identifier.as_str()).collect();
    assert_eq!(incomplete, vec!["1", "2", "3"]);

    let sparse = &summary.outcomes[2];
    assert!(sparse.has_metadata);
    assert!(sparse.unresolved.contains(&Field::Abstract));
    assert!(sparse.missing_required.contains(&Field::Degree));
    assert!(!sparse.missing_required.contains(&Field::Title));

    let (_, rows) = read_rows(&output);
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.len() == COLUMN_COUNT));
    assert_eq!(rows[0][0], "");
    // malformed metadata and sidecar: empty fields, empty publication date
    assert_eq!(rows[1][0], "");
    assert_eq!(rows[1][18], "");
    assert_eq!(rows[2][0], "Only title");
    assert_eq!(rows[3][0], "Sample Thesis");
}

#[test]
fn test_non_primary_author_keeps_single_primary_row() {
    let dir = tempdir().unwrap();
    let with_coauthor = SAMPLE_DATA_XML.replace(
        "  </DISS_authorship>",
        r#"    <DISS_author type="additional">
      <DISS_name>
        <DISS_surname>Okafor</DISS_surname>
        <DISS_fname>Chidi</DISS_fname>
      </DISS_name>
    </DISS_author>
  </DISS_authorship>"#,
    );
    write_submission(dir.path(), "a", "5", Some(&with_coauthor), None);

    let output = dir.path().join("out.csv");
    let summary = run(&PipelineConfig::new(dir.path(), &output)).unwrap();
    assert_eq!(summary.outcomes[0].secondary_authors, 1);

    let (_, rows) = read_rows(&output);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][4], "Ana");
    assert_eq!(rows[0][6], "Ramirez");
}

#[test]
fn test_sidecars_for_overlapping_ids_stay_separate() {
    let dir = tempdir().unwrap();
    let submissions = dir.path().join("subs");
    write_submission(&submissions, "upload_1", "1", Some(SAMPLE_DATA_XML), None);
    write_submission(&submissions, "upload_10", "10", Some(SAMPLE_DATA_XML), None);

    let report = dir.path().join("report.csv");
    fs::write(&report, "ID,Date of last event
1,2020-01-01
10,2021-12-31
").unwrap();
    assert_eq!(write_sidecars(&report, &submissions).unwrap(), 2);
    assert!(!submissions.join("upload_10/1.json").exists());

    // a stray sidecar for another ID must not win over the matching one
    fs::copy(submissions.join("upload_1/1.json"), submissions.join("upload_10/1.json")).unwrap();

    let output = dir.path().join("out.csv");
    run(&PipelineConfig::new(&submissions, &output)).unwrap();

    let (_, rows) = read_rows(&output);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][18], "2020-01-01");
    assert_eq!(rows[1][18], "2021-12-31");
}

#[test]
fn test_accept_date_fallback() {
    let dir = tempdir().unwrap();
    let submissions = dir.path().join("subs");
    write_submission(&submissions, "a", "1", Some(SAMPLE_DATA_XML), None);

    let output = dir.path().join("out.csv");
    let mut config = PipelineConfig::new(&submissions, &output);
    config.accept_date_fallback = true;
    config.season = "Fall".to_string();
    run(&config).unwrap();

    let (_, rows) = read_rows(&output);
    assert_eq!(rows[0][18], "01/01/2021");
    assert_eq!(rows[0][19], "Fall");
}

#[test]
fn test_append_writes_header_once() {
    let dir = tempdir().unwrap();
    let submissions = dir.path().join("subs");
    write_submission(&submissions, "a", "1", Some(SAMPLE_DATA_XML), None);

    let output = dir.path().join("out.csv");
    let mut config = PipelineConfig::new(&submissions, &output);
    config.append = true;
    run(&config).unwrap();
    run(&config).unwrap();

    let (headers, rows) = read_rows(&output);
    assert_eq!(headers[0], "title");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r[0] == "Sample Thesis"));
}

#[test]
fn test_missing_input_directory_is_a_config_error() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::new(dir.path().join("nope"), dir.path().join("out.csv"));
    let err = run(&config).unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}
