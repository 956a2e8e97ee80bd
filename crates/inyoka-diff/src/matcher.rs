//! Longest-matching-block sequence comparison.

use std::collections::HashMap;
use std::hash::Hash;

/// A run of equal items: `a[a..a + size] == b[b..b + size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

/// What to do with a range of `a` to turn it into a range of `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// One edit step: `a[a_start..a_end]` becomes `b[b_start..b_end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: Tag,
    pub a_start: usize,
    pub a_end: usize,
    pub b_start: usize,
    pub b_end: usize,
}

/// Compares two sequences by repeatedly taking the longest common block
/// and recursing on both sides of it.
pub struct SequenceMatcher<'a, T> {
    a: &'a [T],
    b: &'a [T],
    /// Positions of every item of `b`.
    b2j: HashMap<&'a T, Vec<usize>>,
}

impl<'a, T: Eq + Hash> SequenceMatcher<'a, T> {
    pub fn new(a: &'a [T], b: &'a [T]) -> Self {
        let mut b2j: HashMap<&T, Vec<usize>> = HashMap::new();
        for (j, item) in b.iter().enumerate() {
            b2j.entry(item).or_default().push(j);
        }
        Self { a, b, b2j }
    }

    fn longest_match(&self, a_lo: usize, a_hi: usize, b_lo: usize, b_hi: usize) -> Match {
        let mut best = Match {
            a: a_lo,
            b: b_lo,
            size: 0,
        };
        let mut run_lengths: HashMap<usize, usize> = HashMap::new();
        for i in a_lo..a_hi {
            let mut next_lengths = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < b_lo {
                        continue;
                    }
                    if j >= b_hi {
                        break;
                    }
                    let length = j
                        .checked_sub(1)
                        .and_then(|prev| run_lengths.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_lengths.insert(j, length);
                    if length > best.size {
                        best = Match {
                            a: i + 1 - length,
                            b: j + 1 - length,
                            size: length,
                        };
                    }
                }
            }
            run_lengths = next_lengths;
        }
        best
    }

    /// Matching blocks in order, adjacent blocks merged, terminated by a
    /// zero sized block at the ends of both sequences.
    pub fn matching_blocks(&self) -> Vec<Match> {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();
        while let Some((a_lo, a_hi, b_lo, b_hi)) = queue.pop() {
            let found = self.longest_match(a_lo, a_hi, b_lo, b_hi);
            if found.size == 0 {
                continue;
            }
            if a_lo < found.a && b_lo < found.b {
                queue.push((a_lo, found.a, b_lo, found.b));
            }
            if found.a + found.size < a_hi && found.b + found.size < b_hi {
                queue.push((found.a + found.size, a_hi, found.b + found.size, b_hi));
            }
            blocks.push(found);
        }
        blocks.sort_by_key(|block| (block.a, block.b));

        let mut merged: Vec<Match> = Vec::with_capacity(blocks.len() + 1);
        for block in blocks {
            match merged.last_mut() {
                Some(last) if last.a + last.size == block.a && last.b + last.size == block.b => {
                    last.size += block.size;
                }
                _ => merged.push(block),
            }
        }
        merged.push(Match {
            a: self.a.len(),
            b: self.b.len(),
            size: 0,
        });
        merged
    }

    /// Edit steps turning `a` into `b`.
    pub fn opcodes(&self) -> Vec<Opcode> {
        let (mut i, mut j) = (0, 0);
        let mut opcodes = Vec::new();
        for block in self.matching_blocks() {
            let tag = match (i < block.a, j < block.b) {
                (true, true) => Some(Tag::Replace),
                (true, false) => Some(Tag::Delete),
                (false, true) => Some(Tag::Insert),
                (false, false) => None,
            };
            if let Some(tag) = tag {
                opcodes.push(Opcode {
                    tag,
                    a_start: i,
                    a_end: block.a,
                    b_start: j,
                    b_end: block.b,
                });
            }
            i = block.a + block.size;
            j = block.b + block.size;
            if block.size > 0 {
                opcodes.push(Opcode {
                    tag: Tag::Equal,
                    a_start: block.a,
                    a_end: i,
                    b_start: block.b,
                    b_end: j,
                });
            }
        }
        opcodes
    }

    /// Changes with up to `context` equal items around them, split where
    /// more than twice that many equal items separate two changes.
    pub fn grouped_opcodes(&self, context: usize) -> Vec<Vec<Opcode>> {
        let mut codes = self.opcodes();
        if codes.is_empty() {
            codes.push(Opcode {
                tag: Tag::Equal,
                a_start: 0,
                a_end: 1,
                b_start: 0,
                b_end: 1,
            });
        }
        if let Some(first) = codes.first_mut()
            && first.tag == Tag::Equal
        {
            first.a_start = first.a_start.max(first.a_end.saturating_sub(context));
            first.b_start = first.b_start.max(first.b_end.saturating_sub(context));
        }
        if let Some(last) = codes.last_mut()
            && last.tag == Tag::Equal
        {
            last.a_end = last.a_end.min(last.a_start + context);
            last.b_end = last.b_end.min(last.b_start + context);
        }

        let mut groups = Vec::new();
        let mut group = Vec::new();
        for code in codes {
            if code.tag == Tag::Equal && code.a_end - code.a_start > context * 2 {
                group.push(Opcode {
                    a_end: code.a_end.min(code.a_start + context),
                    b_end: code.b_end.min(code.b_start + context),
                    ..code
                });
                groups.push(std::mem::take(&mut group));
                group.push(Opcode {
                    a_start: code.a_start.max(code.a_end.saturating_sub(context)),
                    b_start: code.b_start.max(code.b_end.saturating_sub(context)),
                    ..code
                });
            } else {
                group.push(code);
            }
        }
        if !(group.is_empty() || group.len() == 1 && group[0].tag == Tag::Equal) {
            groups.push(group);
        }
        groups
    }

    /// Similarity in `[0, 1]`: twice the matched items over all items.
    pub fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = self.matching_blocks().iter().map(|block| block.size).sum();
        ratio(matches, total)
    }

    /// Upper bound of [`ratio`](Self::ratio) from the item counts alone.
    pub fn quick_ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let mut available: HashMap<&T, usize> = HashMap::new();
        for item in self.b {
            *available.entry(item).or_default() += 1;
        }
        let mut matches = 0;
        for item in self.a {
            if let Some(count) = available.get_mut(item)
                && *count > 0
            {
                *count -= 1;
                matches += 1;
            }
        }
        ratio(matches, total)
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(matches: usize, total: usize) -> f64 {
    2.0 * matches as f64 / total as f64
}

/// Similarity of two strings, compared by characters.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    SequenceMatcher::new(&a, &b).ratio()
}

/// The `n` candidates most similar to `word`, best first.
///
/// Comparison ignores case. Candidates below `cutoff` are dropped.
///
/// ```
/// use inyoka_diff::get_close_matches;
///
/// let pages = ["Startseite", "Baustelle", "Startseiten_Archiv"];
/// assert_eq!(get_close_matches("startseite", pages, 2, 0.6), vec!["Startseite", "Startseiten_Archiv"]);
/// ```
pub fn get_close_matches<I, S>(word: &str, candidates: I, n: usize, cutoff: f64) -> Vec<S>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let word: Vec<char> = word.to_lowercase().chars().collect();
    let mut scored: Vec<(f64, S)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let chars: Vec<char> = candidate.as_ref().to_lowercase().chars().collect();
            let matcher = SequenceMatcher::new(&chars, &word);
            if matcher.quick_ratio() < cutoff {
                return None;
            }
            let score = matcher.ratio();
            (score >= cutoff).then_some((score, candidate))
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.as_ref().cmp(a.1.as_ref())));
    scored.truncate(n);
    scored.into_iter().map(|(_, candidate)| candidate).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_matching_blocks() {
        let (a, b) = (chars("abxcd"), chars("abcd"));
        assert_eq!(
            SequenceMatcher::new(&a, &b).matching_blocks(),
            vec![
                Match { a: 0, b: 0, size: 2 },
                Match { a: 3, b: 2, size: 2 },
                Match { a: 5, b: 4, size: 0 },
            ]
        );
    }

    #[test]
    fn test_opcodes() {
        let (a, b) = (chars("qabxcd"), chars("abycdf"));
        let tags: Vec<(Tag, usize, usize, usize, usize)> = SequenceMatcher::new(&a, &b)
            .opcodes()
            .into_iter()
            .map(|op| (op.tag, op.a_start, op.a_end, op.b_start, op.b_end))
            .collect();
        assert_eq!(
            tags,
            vec![
                (Tag::Delete, 0, 1, 0, 0),
                (Tag::Equal, 1, 3, 0, 2),
                (Tag::Replace, 3, 4, 2, 3),
                (Tag::Equal, 4, 6, 3, 5),
                (Tag::Insert, 6, 6, 5, 6),
            ]
        );
    }

    #[test]
    fn test_grouped_opcodes_split_on_long_equal_runs() {
        let a: Vec<u32> = (0..20).collect();
        let mut b = a.clone();
        b[1] = 100;
        b[18] = 200;
        let groups = SequenceMatcher::new(&a, &b).grouped_opcodes(2);
        assert_eq!(groups.len(), 2);
        assert_eq!((groups[0][0].a_start, groups[0].last().unwrap().a_end), (0, 4));
        assert_eq!((groups[1][0].a_start, groups[1].last().unwrap().a_end), (16, 20));
    }

    #[test]
    fn test_identical_sequences_have_no_groups() {
        let a = chars("same");
        assert!(SequenceMatcher::new(&a, &a).grouped_opcodes(3).is_empty());
    }

    #[test]
    fn test_similarity() {
        assert!((similarity("abcd", "bcde") - 0.75).abs() < f64::EPSILON);
        assert!((similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!(similarity("abc", "xyz").abs() < f64::EPSILON);
    }

    #[test]
    fn test_close_matches_ignore_case() {
        let pages = vec!["Ubuntu_Installation", "ubuntu", "Debian", "UBUNTU"];
        assert_eq!(get_close_matches("Ubuntu", pages, 10, 0.6), vec!["ubuntu", "UBUNTU"]);
    }
}
