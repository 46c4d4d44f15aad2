use std::collections::HashSet;
use std::path::PathBuf;

/// Files a job is about to ship that another job's last snapshot already
/// covers. Purely advisory; overlapping jobs still both transfer.
#[derive(Debug, Clone)]
pub struct Overlap {
    pub other_job: String,
    pub files: Vec<PathBuf>,
}

/// Intersect `files` with every other job's stored snapshot. One `Overlap`
/// per other job with a non-empty intersection, in no particular order.
pub fn find_overlaps<'a, I>(files: &HashSet<PathBuf>, others: I) -> Vec<Overlap>
where
    I: IntoIterator<Item = (&'a str, &'a HashSet<PathBuf>)>,
{
    let mut overlaps = Vec::new();
    for (other_job, snapshot) in others {
        let mut shared: Vec<PathBuf> = files.intersection(snapshot).cloned().collect();
        if !shared.is_empty() {
            shared.sort();
            overlaps.push(Overlap {
                other_job: other_job.to_string(),
                files: shared,
            });
        }
    }
    overlaps
}
