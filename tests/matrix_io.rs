use flate2::Compression;
use flate2::write::GzEncoder;
use ndarray::array;
use pruning_rs::io::matrix::read_matrix;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_path(prefix: &str, ext: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time is before unix epoch")
        .as_nanos();
    path.push(format!("{prefix}_{}_{}.{}", std::process::id(), nanos, ext));
    path
}

#[test]
fn reads_whitespace_and_comma_separated_rows() {
    let path = unique_temp_path("matrix_mixed", "tsv");
    let content = "\
# model for two characters
0.9\t0.1

0.2, 0.8
";
    fs::write(&path, content).expect("failed to write test matrix");

    let m = read_matrix(&path).expect("failed to parse matrix");
    assert_eq!(m, array![[0.9, 0.1], [0.2, 0.8]]);

    let _ = fs::remove_file(path);
}

#[test]
fn reads_gzipped_matrix() {
    let path = unique_temp_path("matrix_gz", "tsv.gz");
    let file = fs::File::create(&path).expect("failed to create gz matrix");
    let mut enc = GzEncoder::new(file, Compression::default());
    enc.write_all(b"1 2 3\n4 5 6\n").expect("failed to write gz body");
    enc.finish().expect("failed to finish gz stream");

    let m = read_matrix(&path).expect("failed to parse gz matrix");
    assert_eq!(m, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

    let _ = fs::remove_file(path);
}

#[test]
fn ragged_rows_are_rejected() {
    let path = unique_temp_path("matrix_ragged", "tsv");
    fs::write(&path, "0.5 0.5\n0.1 0.2 0.7\n").expect("failed to write test matrix");

    let err = read_matrix(&path).expect_err("ragged matrix should fail");
    assert!(format!("{err:#}").contains("expected 2 columns"));

    let _ = fs::remove_file(path);
}

#[test]
fn bad_numbers_and_empty_files_are_rejected() {
    let bad = unique_temp_path("matrix_bad", "tsv");
    fs::write(&bad, "0.5 abc\n").expect("failed to write test matrix");
    assert!(read_matrix(&bad).is_err());

    let empty = unique_temp_path("matrix_empty", "tsv");
    fs::write(&empty, "# nothing here\n\n").expect("failed to write test matrix");
    assert!(read_matrix(&empty).is_err());

    let _ = fs::remove_file(bad);
    let _ = fs::remove_file(empty);
}
