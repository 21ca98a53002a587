//! Synthetic operation streams for exercising a [`BPlusIndex`].
//!
//! A workload is a text file with one operation per line:
//! ```text
//! 1 <key> <value>   insert
//! 2 <key>           remove
//! 3 <key> <value>   update
//! 4 <key> <value>   expect get(key) == value
//! ```

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::common::{Error, Result};
use crate::index::BPlusIndex;

/// One line of a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert { key: i32, value: i64 },
    Remove { key: i32 },
    Update { key: i32, value: i64 },
    /// The value a lookup of `key` must return at this point.
    Expect { key: i32, value: i64 },
}

impl Operation {
    fn code(&self) -> u8 {
        match self {
            Operation::Insert { .. } => 1,
            Operation::Remove { .. } => 2,
            Operation::Update { .. } => 3,
            Operation::Expect { .. } => 4,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operation::Remove { key } => write!(f, "{} {}", self.code(), key),
            Operation::Insert { key, value }
            | Operation::Update { key, value }
            | Operation::Expect { key, value } => write!(f, "{} {} {}", self.code(), key, value),
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();
        let mut next = |name: &str| {
            fields
                .next()
                .ok_or_else(|| format!("missing {name}"))
        };

        let code = next("operation code")?;
        let key = next("key")?
            .parse::<i32>()
            .map_err(|e| format!("bad key: {e}"))?;

        let op = match code {
            "2" => Operation::Remove { key },
            "1" | "3" | "4" => {
                let value = next("value")?
                    .parse::<i64>()
                    .map_err(|e| format!("bad value: {e}"))?;
                match code {
                    "1" => Operation::Insert { key, value },
                    "3" => Operation::Update { key, value },
                    _ => Operation::Expect { key, value },
                }
            }
            other => return Err(format!("unknown operation code {other:?}")),
        };

        if let Some(extra) = fields.next() {
            return Err(format!("unexpected trailing field {extra:?}"));
        }
        Ok(op)
    }
}

/// Seeded producer of random workloads.
///
/// Each step draws a mode from 0..16: 0 removes a live key, 1..=10 inserts a
/// fresh key and the rest update a live key. An empty key set always
/// inserts. Every step is followed by an [`Operation::Expect`] for a random
/// live key, unless the step removed the last one.
pub struct WorkloadGenerator {
    rng: StdRng,
}

impl WorkloadGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Produce a workload that performs `inserts` successful inserts.
    pub fn generate(&mut self, inserts: usize) -> Vec<Operation> {
        let mut ops = Vec::new();
        let mut live: Vec<(i32, i64)> = Vec::new();
        let mut present: HashSet<i32> = HashSet::new();
        let mut inserted = 0;

        while inserted < inserts {
            let mode = self.rng.gen_range(0..16);

            if mode < 1 && !live.is_empty() {
                let (key, _) = live.swap_remove(self.rng.gen_range(0..live.len()));
                present.remove(&key);
                ops.push(Operation::Remove { key });
            } else if mode < 11 || live.is_empty() {
                let key = loop {
                    let candidate = self.rng.gen_range(0..=i32::MAX);
                    if present.insert(candidate) {
                        break candidate;
                    }
                };
                let value: i64 = self.rng.gen();
                live.push((key, value));
                inserted += 1;
                ops.push(Operation::Insert { key, value });
            } else {
                let idx = self.rng.gen_range(0..live.len());
                let value: i64 = self.rng.gen();
                live[idx].1 = value;
                ops.push(Operation::Update {
                    key: live[idx].0,
                    value,
                });
            }

            if !live.is_empty() {
                let (key, value) = live[self.rng.gen_range(0..live.len())];
                ops.push(Operation::Expect { key, value });
            }
        }

        ops
    }
}

/// Write `ops` to `path`, one per line.
pub fn write_workload<P: AsRef<Path>>(path: P, ops: &[Operation]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    for op in ops {
        writeln!(out, "{op}")?;
    }
    out.flush()?;
    Ok(())
}

/// Read a workload file. Blank lines are skipped.
///
/// # Errors
/// `Workload` with the 1-based line number of the first malformed line.
pub fn read_workload<P: AsRef<Path>>(path: P) -> Result<Vec<Operation>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut ops = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let op = line
            .parse::<Operation>()
            .map_err(|reason| Error::Workload { line: idx + 1, reason })?;
        ops.push(op);
    }

    debug!(path = %path.as_ref().display(), ops = ops.len(), "read workload");
    Ok(ops)
}

/// An `Expect` or `Update` whose key did not hold the expected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Position of the operation in the replayed slice.
    pub index: usize,
    pub op: Operation,
    /// Value found, `None` if the key was absent.
    pub found: Option<i64>,
}

/// Outcome of [`replay`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Insert, remove and update operations executed.
    pub applied: usize,
    /// Expectations that held.
    pub verified: usize,
    pub mismatches: Vec<Mismatch>,
}

impl ReplayReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Apply `ops` to `index` in order, checking each `Expect` against `get`.
///
/// Missing keys on `Update` and `Expect` are recorded as mismatches; any
/// other error aborts the replay.
pub fn replay(index: &mut BPlusIndex<i32, i64>, ops: &[Operation]) -> Result<ReplayReport> {
    let mut report = ReplayReport::default();

    for (i, &op) in ops.iter().enumerate() {
        match op {
            Operation::Insert { key, value } => {
                index.insert(key, value)?;
                report.applied += 1;
            }
            Operation::Remove { key } => {
                index.remove(&key)?;
                report.applied += 1;
            }
            Operation::Update { key, value } => match index.update(&key, &value) {
                Ok(()) => report.applied += 1,
                Err(Error::KeyNotFound | Error::EmptyIndex) => report.mismatches.push(Mismatch {
                    index: i,
                    op,
                    found: None,
                }),
                Err(e) => return Err(e),
            },
            Operation::Expect { key, value } => {
                let found = match index.get(&key) {
                    Ok(v) => Some(v),
                    Err(Error::KeyNotFound | Error::EmptyIndex) => None,
                    Err(e) => return Err(e),
                };
                if found == Some(value) {
                    report.verified += 1;
                } else {
                    report.mismatches.push(Mismatch { index: i, op, found });
                }
            }
        }
    }

    info!(
        applied = report.applied,
        verified = report.verified,
        mismatches = report.mismatches.len(),
        "replayed workload"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_display_and_parse() {
        let ops = [
            Operation::Insert { key: 7, value: -9 },
            Operation::Remove { key: 7 },
            Operation::Update { key: 1, value: i64::MAX },
            Operation::Expect { key: 0, value: 0 },
        ];
        let lines: Vec<String> = ops.iter().map(|op| op.to_string()).collect();
        assert_eq!(lines, ["1 7 -9", "2 7", "3 1 9223372036854775807", "4 0 0"]);

        for (line, op) in lines.iter().zip(ops) {
            assert_eq!(line.parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Operation>().unwrap_err().contains("missing"));
        assert!("5 1 1".parse::<Operation>().unwrap_err().contains("unknown"));
        assert!("1 x 1".parse::<Operation>().unwrap_err().contains("bad key"));
        assert!("1 1".parse::<Operation>().unwrap_err().contains("missing value"));
        assert!("2 1 1".parse::<Operation>().unwrap_err().contains("trailing"));
    }

    #[test]
    fn test_generator_is_deterministic() {
        let a = WorkloadGenerator::new(7).generate(200);
        let b = WorkloadGenerator::new(7).generate(200);
        let c = WorkloadGenerator::new(8).generate(200);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_generator_shape() {
        let ops = WorkloadGenerator::new(1).generate(500);

        let inserts = ops
            .iter()
            .filter(|op| matches!(op, Operation::Insert { .. }))
            .count();
        assert_eq!(inserts, 500);
        assert!(matches!(ops[0], Operation::Insert { .. }));

        // Expectations agree with a model of the live key set.
        let mut model = std::collections::HashMap::new();
        for op in &ops {
            match *op {
                Operation::Insert { key, value } => {
                    assert!(model.insert(key, value).is_none(), "reused key {key}");
                }
                Operation::Remove { key } => assert!(model.remove(&key).is_some()),
                Operation::Update { key, value } => {
                    assert!(model.insert(key, value).is_some());
                }
                Operation::Expect { key, value } => assert_eq!(model.get(&key), Some(&value)),
            }
        }
    }

    #[test]
    fn test_read_reports_line_number() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "1 1 1\n\n4 1 1\n3 oops\n").unwrap();

        match read_workload(&path) {
            Err(Error::Workload { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected workload error, got {other:?}"),
        }
    }
}
