use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::frequency::Tallies;
use crate::partition::Topology;
use crate::record::{normalize_hashtag, trim_line, Extraction, Record};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read failed at line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub owned: usize,
    pub parsed: usize,
    pub blank: usize,
    pub malformed: usize,
}

/// Result of one participant's scan. `tallies` holds whatever was counted
/// before `error`, if any, stopped the scan.
#[derive(Debug)]
pub struct ScanOutcome {
    pub tallies: Tallies,
    pub stats: ScanStats,
    pub error: Option<ScanError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedLine {
    pub index: usize,
    pub bytes: Vec<u8>,
}

/// Lines of `reader` owned by `topology`'s rank. Yields the first I/O error
/// and then stops.
pub struct OwnedLines<R> {
    reader: R,
    topology: Topology,
    next_index: usize,
    done: bool,
}

impl<R: BufRead> OwnedLines<R> {
    pub fn new(reader: R, topology: Topology) -> Self {
        OwnedLines {
            reader,
            topology,
            next_index: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for OwnedLines<R> {
    type Item = Result<OwnedLine, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let index = self.next_index;
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    self.next_index += 1;
                    if self.topology.owns(index) {
                        return Some(Ok(OwnedLine { index, bytes: buf }));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(source) => {
                    self.done = true;
                    return Some(Err(ScanError::Read {
                        line: index,
                        source,
                    }));
                }
            }
        }
    }
}

pub struct Scanner {
    topology: Topology,
    extraction: Extraction,
}

impl Scanner {
    pub fn new(topology: Topology, extraction: Extraction) -> Self {
        Scanner {
            topology,
            extraction,
        }
    }

    pub fn scan_path(&self, path: &Path) -> ScanOutcome {
        match File::open(path) {
            Ok(file) => self.scan(BufReader::new(file)),
            Err(source) => {
                let error = ScanError::Open {
                    path: path.to_path_buf(),
                    source,
                };
                error!(rank = self.topology.rank(), "{}", error);
                ScanOutcome {
                    tallies: Tallies::new(),
                    stats: ScanStats::default(),
                    error: Some(error),
                }
            }
        }
    }

    pub fn scan<R: BufRead>(&self, reader: R) -> ScanOutcome {
        let rank = self.topology.rank();
        info!(rank, "initiating scan");

        let mut tallies = Tallies::new();
        let mut stats = ScanStats::default();
        let mut failure = None;

        for line in OwnedLines::new(reader, self.topology) {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!(rank, "{}; keeping counts gathered so far", e);
                    failure = Some(e);
                    break;
                }
            };
            stats.owned += 1;

            let bytes = trim_line(&line.bytes);
            if bytes.is_empty() {
                stats.blank += 1;
                continue;
            }
            match Record::parse(bytes, self.extraction) {
                Ok(record) => {
                    stats.parsed += 1;
                    fold(&mut tallies, record);
                }
                Err(e) => {
                    stats.malformed += 1;
                    debug!(rank, line = line.index, "skipping record: {}", e);
                }
            }
        }

        info!(
            rank,
            owned = stats.owned,
            parsed = stats.parsed,
            malformed = stats.malformed,
            "scan done"
        );
        ScanOutcome {
            tallies,
            stats,
            error: failure,
        }
    }
}

fn fold(tallies: &mut Tallies, record: Record) {
    tallies.languages.add(record.lang);
    for tag in &record.hashtags {
        tallies.hashtags.add(normalize_hashtag(tag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::FrequencyTable;
    use std::io::{Cursor, Read};

    const CORPUS: &str = concat!(
        "{\"total_rows\":5,\"rows\":[\n",
        "{\"doc\":{\"lang\":\"en\",\"entities\":{\"hashtags\":[{\"text\":\"Foo\"},{\"text\":\"foo\"}]}}},\n",
        "{\"doc\":{\"lang\":\"en\",\"entities\":{\"hashtags\":[{\"text\":\"bar\"}]}}},\n",
        "\n",
        "{\"doc\":{\"lang\":\"fr\",\"entities\":{\"hashtags\":[]}}},\n",
        "{\"doc\":{\"lang\":\"ja\",\"entities\":{\"hashtags\":[{\"text\":\"FOO\"}]}}}\n",
        "]}\n",
    );

    fn scan_all(corpus: &str, size: usize) -> Tallies {
        let mut total = Tallies::new();
        for rank in 0..size {
            let topology = Topology::new(rank, size).unwrap();
            let outcome = Scanner::new(topology, Extraction::Entities).scan(Cursor::new(corpus));
            assert!(outcome.error.is_none());
            total.merge(outcome.tallies);
        }
        total
    }

    #[test]
    fn test_owned_lines_follow_partition() {
        let input = "a\nb\nc\nd\ne\n";
        let topology = Topology::new(1, 2).unwrap();
        let lines: Vec<OwnedLine> = OwnedLines::new(Cursor::new(input), topology)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            lines,
            vec![
                OwnedLine { index: 1, bytes: b"b\n".to_vec() },
                OwnedLine { index: 3, bytes: b"d\n".to_vec() },
            ]
        );
    }

    #[test]
    fn test_scan_counts_and_skips() {
        let outcome = Scanner::new(Topology::single(), Extraction::Entities).scan(Cursor::new(CORPUS));

        assert!(outcome.error.is_none());
        assert_eq!(outcome.tallies.hashtags.count("foo"), 3);
        assert_eq!(outcome.tallies.hashtags.count("bar"), 1);
        assert_eq!(outcome.tallies.hashtags.count("Foo"), 0);
        assert_eq!(outcome.tallies.languages.count("en"), 2);
        assert_eq!(outcome.tallies.languages.count("fr"), 1);
        assert_eq!(
            outcome.stats,
            ScanStats {
                owned: 7,
                parsed: 4,
                blank: 1,
                malformed: 2,
            }
        );
    }

    #[test]
    fn test_partitioned_scan_matches_single_pass() {
        let single = scan_all(CORPUS, 1);
        for size in 2..=5 {
            assert_eq!(scan_all(CORPUS, size), single, "{} participants", size);
        }
    }

    #[test]
    fn test_malformed_lines_do_not_change_counts() {
        let good = [
            r#"{"doc":{"lang":"en","entities":{"hashtags":[{"text":"a"}]}}}"#,
            r#"{"doc":{"lang":"de","entities":{"hashtags":[{"text":"B"},{"text":"a"}]}}}"#,
            r#"{"doc":{"lang":"en","entities":{"hashtags":[]}}}"#,
        ];
        let bad = ["{oops", r#"{"doc":{"lang":"en"}}"#, "[1,2", r#"{"doc":null}"#];

        let clean = good.join("\n");
        let mut mixed = Vec::new();
        for (i, line) in good.iter().enumerate() {
            mixed.push(bad[i % bad.len()]);
            mixed.push(*line);
        }
        mixed.extend(bad.iter());
        let mixed = mixed.join("\n");

        for size in 1..=3 {
            assert_eq!(scan_all(&clean, size), scan_all(&mixed, size));
        }
        let outcome = Scanner::new(Topology::single(), Extraction::Entities).scan(Cursor::new(mixed));
        assert_eq!(outcome.stats.malformed, 7);
        assert_eq!(outcome.stats.parsed, 3);
    }

    #[test]
    fn test_text_extraction() {
        let corpus = concat!(
            "{\"doc\":{\"text\":\"#Foo and #foo\",\"lang\":\"en\"}},\n",
            "{\"doc\":{\"text\":\"just #bar\",\"lang\":\"en\"}},\n",
            "{\"doc\":{\"text\":\"nothing here\",\"lang\":\"fr\"}},\n",
        );
        let outcome = Scanner::new(Topology::single(), Extraction::Text).scan(Cursor::new(corpus));

        let expected: FrequencyTable = ["foo", "foo", "bar"].into_iter().collect();
        assert_eq!(outcome.tallies.hashtags, expected);
        assert_eq!(outcome.tallies.languages.count("en"), 2);
        assert_eq!(outcome.tallies.languages.count("fr"), 1);
    }

    struct FailAfter {
        inner: Cursor<Vec<u8>>,
        remaining: usize,
    }

    impl Read for FailAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk went away"));
            }
            let n = buf.len().min(self.remaining);
            let read = self.inner.read(&mut buf[..n])?;
            self.remaining -= read;
            Ok(read)
        }
    }

    #[test]
    fn test_read_failure_keeps_partial_counts() {
        let first = "{\"doc\":{\"lang\":\"en\",\"entities\":{\"hashtags\":[{\"text\":\"kept\"}]}}}\n";
        let corpus = format!(
            "{}{}",
            first, "{\"doc\":{\"lang\":\"fr\",\"entities\":{\"hashtags\":[{\"text\":\"lost\"}]}}}\n"
        );
        let reader = BufReader::with_capacity(
            8,
            FailAfter {
                inner: Cursor::new(corpus.into_bytes()),
                remaining: first.len() + 5,
            },
        );
        let outcome = Scanner::new(Topology::single(), Extraction::Entities).scan(reader);

        assert!(matches!(outcome.error, Some(ScanError::Read { line: 1, .. })));
        assert_eq!(outcome.tallies.hashtags.count("kept"), 1);
        assert_eq!(outcome.tallies.hashtags.count("lost"), 0);
        assert_eq!(outcome.tallies.languages.count("en"), 1);
    }

    #[test]
    fn test_missing_file_yields_empty_tallies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let outcome = Scanner::new(Topology::new(1, 2).unwrap(), Extraction::Entities).scan_path(&path);

        assert!(matches!(outcome.error, Some(ScanError::Open { .. })));
        assert_eq!(outcome.tallies, Tallies::new());
    }

    #[test]
    fn test_scan_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, CORPUS.as_bytes()).unwrap();
        let outcome = Scanner::new(Topology::single(), Extraction::Entities).scan_path(file.path());

        assert!(outcome.error.is_none());
        assert_eq!(outcome.tallies, scan_all(CORPUS, 1));
    }
}
