//! Most-popular file rankings

use crate::domain::{FileId, FileSet};

/// Order files by descending popularity; ties keep the lower file id first.
pub fn rank_files<I>(counts: I) -> Vec<FileId>
where
    I: IntoIterator<Item = (FileId, u64)>,
{
    let mut ranked: Vec<(FileId, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(f, _)| f).collect()
}

/// The first `limit` files of a ranking as a set. A limit of 0 keeps the
/// whole ranking.
pub fn top_files(ranked: &[FileId], limit: usize) -> FileSet {
    let take = if limit == 0 {
        ranked.len()
    } else {
        limit.min(ranked.len())
    };
    ranked[..take].iter().copied().collect()
}
