use crate::error::RunError;

/// Which shard of the suite list this invocation runs (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSpec {
    pub index: usize,
    pub total: usize,
}

impl BatchSpec {
    /// Parse "<this>-<all>", e.g. "2-3"
    pub fn parse(s: &str) -> Result<Self, RunError> {
        let parts: Vec<&str> = s.trim().split('-').collect();
        if parts.len() != 2 {
            return Err(RunError::config(format!(
                "bad batch input format '{}'. Expected <this>-<all>, e.g. 2-3",
                s
            )));
        }

        // Plain digits only: `usize::from_str` alone would take "+1"
        let parse_part = |part: &str| {
            let digits = !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
            digits.then(|| part.parse::<usize>().ok()).flatten().ok_or_else(|| {
                RunError::config(format!(
                    "bad batch input format '{}'. Expected <this>-<all>, e.g. 2-3",
                    s
                ))
            })
        };
        let index = parse_part(parts[0])?;
        let total = parse_part(parts[1])?;

        if index == 0 || total == 0 {
            return Err(RunError::config(
                "test batch number or batch counts must be non-zero values",
            ));
        }
        if index > total {
            return Err(RunError::config(
                "test batch number is larger than batch counts",
            ));
        }

        Ok(Self { index, total })
    }

    /// Size of every shard but the last: ceil(len / total)
    pub fn chunk_size(&self, len: usize) -> usize {
        len.div_ceil(self.total)
    }

    fn is_last(&self) -> bool {
        self.index == self.total
    }
}

/// Slice `suites` down to the shard named by `batch`.
///
/// The last shard runs to the end of the list so remainders are never lost.
/// Without a batch spec the list is returned unchanged.
pub fn partition<T>(suites: Vec<T>, batch: Option<BatchSpec>) -> Vec<T> {
    let Some(batch) = batch else {
        return suites;
    };

    let len = suites.len();
    let chunk = batch.chunk_size(len);
    let start = ((batch.index - 1) * chunk).min(len);
    let end = if batch.is_last() {
        len
    } else {
        (batch.index * chunk).min(len)
    };

    suites.into_iter().skip(start).take(end - start).collect()
}
