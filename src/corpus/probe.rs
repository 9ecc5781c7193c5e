//! Parallel header parsing for a list of audio files.

use crate::audio::{SphereFormat, read_header};
use crate::error::Result;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::thread;

/// Outcome of parsing one file's header.
#[derive(Debug)]
pub struct HeaderReport {
    pub path: PathBuf,
    pub result: Result<SphereFormat>,
}

/// Parse the header of every file in `paths` using up to `workers` threads.
///
/// Reports come back in the same order as `paths`.
pub fn probe_headers(paths: &[PathBuf], workers: usize) -> Vec<HeaderReport> {
    let workers = workers.clamp(1, paths.len().max(1));
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &Path)>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, Result<SphereFormat>)>();

    for (index, path) in paths.iter().enumerate() {
        if job_tx.send((index, path.as_path())).is_err() {
            break;
        }
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                for (index, path) in job_rx {
                    if result_tx.send((index, probe_one(path))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<Result<SphereFormat>>> = paths.iter().map(|_| None).collect();
    for (index, result) in result_rx {
        slots[index] = Some(result);
    }

    paths
        .iter()
        .zip(slots)
        .filter_map(|(path, slot)| {
            slot.map(|result| HeaderReport {
                path: path.clone(),
                result,
            })
        })
        .collect()
}

fn probe_one(path: &Path) -> Result<SphereFormat> {
    let mut reader = BufReader::new(File::open(path)?);
    let format = read_header(&mut reader, &path.display().to_string())?;
    log::trace!("Parsed header of {}", path.display());
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_sphere;
    use crate::error::CorpusError;
    use std::fs;

    fn sphere(dir: &Path, name: &str, sample_rate: u32) -> PathBuf {
        let path = dir.join(name);
        let format = SphereFormat {
            sample_rate,
            ..SphereFormat::default()
        };
        write_sphere(&mut File::create(&path).unwrap(), &format, &[0u16; 16]).unwrap();
        path
    }

    #[test]
    fn reports_follow_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..12)
            .map(|i| sphere(dir.path(), &format!("{}.sph", i), 8000 + i))
            .collect();

        let reports = probe_headers(&paths, 4);
        assert_eq!(reports.len(), 12);
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.path, paths[i]);
            assert_eq!(report.result.as_ref().unwrap().sample_rate, 8000 + i as u32);
        }
    }

    #[test]
    fn failures_are_reported_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = sphere(dir.path(), "good.sph", 16000);
        let short = dir.path().join("short.sph");
        fs::write(&short, b"NIST_1A\n   1024\n").unwrap();
        let missing = dir.path().join("missing.sph");

        let reports = probe_headers(&[good, short, missing], 2);
        assert!(reports[0].result.is_ok());
        assert!(matches!(
            reports[1].result,
            Err(CorpusError::InvalidHeader { .. })
        ));
        assert!(matches!(reports[2].result, Err(CorpusError::Io(_))));
    }

    #[test]
    fn zero_workers_still_probes() {
        let dir = tempfile::tempdir().unwrap();
        let path = sphere(dir.path(), "a.sph", 16000);
        assert_eq!(probe_headers(&[path], 0).len(), 1);
    }

    #[test]
    fn empty_input_yields_no_reports() {
        assert!(probe_headers(&[], 4).is_empty());
    }
}
