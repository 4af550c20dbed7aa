// src/notify/chunk.rs
//! Splitting oversized messages for length-limited channels.
//!
//! Splits happen on line boundaries; a line longer than the budget is split
//! on spaces, and a single word longer than the budget on characters. The
//! pieces keep their separators, so concatenating the chunks gives back the
//! input exactly. Lengths are counted in `char`s.

/// Hard per-message limit of the chat API.
pub const CHANNEL_LIMIT: usize = 4096;
/// Split budget; the difference to `CHANNEL_LIMIT` is headroom for the part header.
pub const CHUNK_BUDGET: usize = 4000;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

struct Accumulator {
    budget: usize,
    chunks: Vec<String>,
    cur: String,
    cur_len: usize,
}

impl Accumulator {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            chunks: Vec::new(),
            cur: String::new(),
            cur_len: 0,
        }
    }

    /// `piece` must itself fit the budget.
    fn push(&mut self, piece: &str) {
        let len = char_len(piece);
        if self.cur_len > 0 && self.cur_len + len > self.budget {
            self.flush();
        }
        self.cur.push_str(piece);
        self.cur_len += len;
    }

    fn push_hard(&mut self, word: &str) {
        let chars: Vec<char> = word.chars().collect();
        for part in chars.chunks(self.budget) {
            let s: String = part.iter().collect();
            self.push(&s);
        }
    }

    fn flush(&mut self) {
        if self.cur_len > 0 {
            self.chunks.push(std::mem::take(&mut self.cur));
            self.cur_len = 0;
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}

/// Split `text` into chunks of at most `budget` characters each.
pub fn split_message(text: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    if char_len(text) <= budget {
        return vec![text.to_string()];
    }

    let mut acc = Accumulator::new(budget);
    for line in text.split_inclusive('\n') {
        if char_len(line) <= budget {
            acc.push(line);
            continue;
        }
        for word in line.split_inclusive(' ') {
            if char_len(word) <= budget {
                acc.push(word);
            } else {
                acc.push_hard(word);
            }
        }
    }
    acc.finish()
}

pub fn part_header(index: usize, total: usize) -> String {
    format!("📨 Part {index}/{total}\n\n")
}

/// Remove a leading part header, if any.
pub fn strip_part_header(chunk: &str) -> &str {
    if let Some(rest) = chunk.strip_prefix("📨 Part ") {
        if let Some(pos) = rest.find("\n\n") {
            return &rest[pos + 2..];
        }
    }
    chunk
}

/// Split for a channel with a hard `limit`, then number the parts.
///
/// Splitting uses `budget`; if a part header on top of a full chunk could
/// exceed `limit`, the text is split again with the header length reserved.
pub fn chunk_for_channel(text: &str, limit: usize, budget: usize) -> Vec<String> {
    let mut budget = budget.min(limit).max(1);
    let mut parts = split_message(text, budget);
    if parts.len() == 1 {
        return parts;
    }

    let reserve = char_len(&part_header(parts.len() * 10, parts.len() * 10));
    if budget + reserve > limit {
        budget = limit.saturating_sub(reserve).max(1);
        parts = split_message(text, budget);
    }

    let total = parts.len();
    parts
        .into_iter()
        .enumerate()
        .map(|(i, p)| format!("{}{p}", part_header(i + 1, total)))
        .collect()
}
