//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Glob matching of YANG instance paths.
//!
//! Registration patterns are plain instance paths in which `*` may stand for
//! the remainder of a path element (when it follows a `/`) or of a quoted key
//! value (when it follows a `'`). A trailing `*` means "and everything below".
//!
//! The matcher does not produce a yes/no answer. It returns a specificity
//! score instead: the number of structural delimiters (`/`, `[` and `]`) that
//! both strings cross together while matching. When several patterns match
//! the same path, the one with the highest score is the most specific one.

const WILDCARD: u8 = b'*';

// Characters that open a wildcard region when they precede a `*`.
fn is_wildcard_anchor(c: Option<u8>) -> bool {
    matches!(c, Some(b'/') | Some(b'\''))
}

// Characters that count towards the specificity score.
fn is_structural_delim(c: u8) -> bool {
    matches!(c, b'/' | b'[' | b']')
}

fn prev(s: &[u8], idx: usize) -> Option<u8> {
    idx.checked_sub(1).map(|idx| s[idx])
}

/// Evaluates how well `path` matches the glob `pattern`.
///
/// Returns zero when the two don't match. Otherwise the returned value is a
/// specificity score, higher meaning more specific.
///
/// A mismatch found after some delimiters were already crossed doesn't reset
/// the score: a pattern sharing a longer prefix with the path ranks higher
/// even if it diverges afterwards.
pub fn match_len(pattern: &str, path: &str) -> usize {
    let re = pattern.as_bytes();
    let xp = path.as_bytes();
    let mut re_len = re.len();
    let mut xp_len = xp.len();

    // Remove the trailing wildcard from both strings.
    if re_len > 0 && re[re_len - 1] == WILDCARD {
        re_len -= 1;
    }
    if xp_len > 0 && xp[xp_len - 1] == WILDCARD {
        xp_len -= 1;
    }
    if re_len == 0 || xp_len == 0 {
        return 0;
    }

    let mut score = 0;
    let mut re_idx = 0;
    let mut xp_idx = 0;
    let mut matched = true;
    let mut re_wild = false;
    let mut xp_wild = false;
    let mut delim = false;
    let mut in_wildcard = false;
    let mut wild_delim = 0;

    while matched && re_idx < re_len && xp_idx < xp_len {
        matched = re[re_idx] == xp[xp_idx];

        // Check if a wildcard region starts here.
        if !in_wildcard
            && !matched
            && (re[re_idx] == WILDCARD || xp[xp_idx] == WILDCARD)
        {
            in_wildcard = is_wildcard_anchor(prev(re, re_idx))
                || is_wildcard_anchor(prev(xp, xp_idx));
            if in_wildcard {
                if re[re_idx] == WILDCARD {
                    re_wild = true;
                    wild_delim = prev(re, re_idx).unwrap_or_default();
                } else if xp[xp_idx] == WILDCARD {
                    xp_wild = true;
                    wild_delim = prev(xp, xp_idx).unwrap_or_default();
                }
            }
        }

        // Check if the wildcard region ends here.
        if in_wildcard {
            if re_wild && xp[xp_idx] == wild_delim {
                re_wild = false;
                if re_idx < re_len - 1 {
                    re_idx += 1;
                }
                in_wildcard = false;
            } else if xp_wild && re[re_idx] == wild_delim {
                xp_wild = false;
                if xp_idx < xp_len - 1 {
                    xp_idx += 1;
                }
                in_wildcard = false;
            }
        }

        matched = xp_wild || re_wild || re[re_idx] == xp[xp_idx];

        // Both strings are on the same structural delimiter.
        if is_structural_delim(re[re_idx]) && re[re_idx] == xp[xp_idx] {
            if matched && re_idx > 0 && xp_idx > 0 && !delim {
                score += 1;
            }
            delim = true;
        } else {
            delim = false;
        }

        // The side holding the wildcard stays put.
        if !re_wild {
            re_idx += 1;
        }
        if !xp_wild {
            xp_idx += 1;
        }
    }

    // If the scan stopped right before a delimiter of the pattern, the last
    // path element was a full match.
    //
    // NOTE: the character is looked up in the original pattern, so a pattern
    // whose trailing wildcard was stripped never gets this extra credit.
    if matched && !delim && matches!(re.get(re_idx), Some(b'/' | b']')) {
        score += 1;
    }

    score
}

/// Returns whether the given path selects the whole tree.
pub fn is_root(path: &str) -> bool {
    path == "/" || path == "/*"
}

// ===== unit tests =====
