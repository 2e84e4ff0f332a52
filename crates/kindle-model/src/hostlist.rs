use std::str::FromStr;

use crate::{Rank, error::HostlistError};

/// Ordered list of hostnames, one per rank.
///
/// Decodes the compact form accepted on the command line: comma separated
/// names, where each name may carry one bracketed range list such as
/// `node[0-3,7]` or `n[01-04]` (zero padding follows the lower bound).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hostlist(Vec<String>);

/// Upper bound on expanded hostnames.
pub const MAX_HOSTS: usize = 1 << 16;

impl Hostlist {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hostname assigned to `rank`, if any.
    pub fn nth(&self, rank: Rank) -> Option<&str> {
        self.0.get(rank as usize).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromStr for Hostlist {
    type Err = HostlistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut hosts = Vec::new();
        for item in split_top_level(s)? {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            expand(item, &mut hosts)?;
        }
        if hosts.is_empty() {
            return Err(HostlistError::Empty);
        }
        Ok(Self(hosts))
    }
}

fn split_top_level(s: &str) -> Result<Vec<&str>, HostlistError> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| HostlistError::Unbalanced(s.to_string()))?;
            }
            ',' if depth == 0 => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(HostlistError::Unbalanced(s.to_string()));
    }
    out.push(&s[start..]);
    Ok(out)
}

fn expand(item: &str, hosts: &mut Vec<String>) -> Result<(), HostlistError> {
    let Some(open) = item.find('[') else {
        if hosts.len() >= MAX_HOSTS {
            return Err(HostlistError::InvalidRange(item.to_string()));
        }
        hosts.push(item.to_string());
        return Ok(());
    };
    let close = item
        .rfind(']')
        .filter(|&c| c > open)
        .ok_or_else(|| HostlistError::Unbalanced(item.to_string()))?;
    let (prefix, ranges, suffix) = (&item[..open], &item[open + 1..close], &item[close + 1..]);

    if hosts.len() >= MAX_HOSTS {
        return Err(HostlistError::InvalidRange(item.to_string()));
    }
    for range in ranges.split(',') {
        let range = range.trim();
        let (lo, hi) = range.split_once('-').unwrap_or((range, range));
        let width = if lo.len() > 1 && lo.starts_with('0') {
            lo.len()
        } else {
            0
        };
        let invalid = || HostlistError::InvalidRange(range.to_string());
        let lo_n: u64 = lo.parse().map_err(|_| invalid())?;
        let hi_n: u64 = hi.parse().map_err(|_| invalid())?;
        if hi_n < lo_n {
            return Err(invalid());
        }
        let room = (MAX_HOSTS - hosts.len()) as u64;
        if hi_n - lo_n >= room {
            return Err(invalid());
        }
        for n in lo_n..=hi_n {
            hosts.push(format!("{prefix}{n:0width$}{suffix}"));
        }
    }
    Ok(())
}
