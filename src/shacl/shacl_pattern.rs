use crate::errors::TickError;

/// Byte transition table of a one-state automaton.
/// * Entry `b` is 1 if byte `b` keeps the automaton in its accepting state, 0 if it kills it.
pub type PatternTable = [u8; 256];

/// Compiled string-pattern constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatternDfa {
    pub table: PatternTable,
    pub non_empty: bool,
}

impl PatternDfa {
    /// Compile a single character class with an optional quantifier.
    /// * Grammar: `^? ( '[' item* ']' | '.' | '\d' | '\w' | '\s' | char ) ( '+' | '*' )? $?`
    /// * Items are single bytes, `a-z` ranges, or the escapes `\d \w \s \\ \] \- \^`.
    /// * A leading `^` inside the brackets negates the class.
    /// * A bare class reads as `+`, a one-state table cannot count bytes.
    pub fn compile(pattern: &str) -> Result<Self, TickError> {
        let err = |msg: &str| TickError::InvalidShape(format!("pattern '{pattern}': {msg}"));
        let mut bytes = pattern.as_bytes();
        if let [b'^', rest @ ..] = bytes {
            bytes = rest;
        }
        if let [rest @ .., b'$'] = bytes
            && !rest.ends_with(b"\\")
        {
            bytes = rest;
        }

        let mut table = [0u8; 256];
        let mut pos;
        match bytes.first() {
            None => return Err(err("empty pattern")),
            Some(b'[') => {
                pos = 1;
                let negate = bytes.get(1) == Some(&b'^');
                if negate {
                    pos += 1;
                }
                let mut closed = false;
                while pos < bytes.len() {
                    let (lo, next) = match bytes[pos] {
                        b']' => {
                            closed = true;
                            pos += 1;
                            break;
                        }
                        b'\\' => {
                            let esc = *bytes.get(pos + 1).ok_or_else(|| err("dangling escape"))?;
                            if let Some(class) = escape_class(esc) {
                                class.for_each(|b| table[b as usize] = 1);
                                pos += 2;
                                continue;
                            }
                            (esc, pos + 2)
                        }
                        b => (b, pos + 1),
                    };
                    // range `lo-hi`, a trailing '-' is literal
                    if bytes.get(next) == Some(&b'-') && bytes.get(next + 1).is_some_and(|b| *b != b']')
                    {
                        let mut hi_pos = next + 1;
                        let mut hi = bytes[hi_pos];
                        if hi == b'\\' {
                            hi_pos += 1;
                            hi = *bytes.get(hi_pos).ok_or_else(|| err("dangling escape"))?;
                        }
                        if hi < lo {
                            return Err(err("reversed range"));
                        }
                        (lo..=hi).for_each(|b| table[b as usize] = 1);
                        pos = hi_pos + 1;
                    } else {
                        table[lo as usize] = 1;
                        pos = next;
                    }
                }
                if !closed {
                    return Err(err("unclosed character class"));
                }
                if negate {
                    table.iter_mut().for_each(|t| *t ^= 1);
                }
            }
            Some(b'.') => {
                table = [1u8; 256];
                pos = 1;
            }
            Some(b'\\') => {
                let esc = *bytes.get(1).ok_or_else(|| err("dangling escape"))?;
                match escape_class(esc) {
                    Some(class) => class.for_each(|b| table[b as usize] = 1),
                    None => table[esc as usize] = 1,
                }
                pos = 2;
            }
            Some(b) => {
                table[*b as usize] = 1;
                pos = 1;
            }
        }

        let non_empty = match &bytes[pos..] {
            [] | [b'+'] => true,
            [b'*'] => false,
            _ => return Err(err("only a single class with '+' or '*' is supported")),
        };
        Ok(Self { table, non_empty })
    }

    #[inline]
    pub fn matches(&self, value: &[u8]) -> bool {
        run_table(&self.table, self.non_empty, value)
    }
}

fn escape_class(esc: u8) -> Option<Box<dyn Iterator<Item = u8>>> {
    match esc {
        b'd' => Some(Box::new(b'0'..=b'9')),
        b'w' => Some(Box::new(
            (b'a'..=b'z')
                .chain(b'A'..=b'Z')
                .chain(b'0'..=b'9')
                .chain([b'_']),
        )),
        b's' => Some(Box::new([b' ', b'\t', b'\n', b'\r', 0x0b, 0x0c].into_iter())),
        _ => None,
    }
}

/// Branch-free table walk, the state only ever drops from 1 to 0.
#[inline]
pub(crate) fn run_table(table: &PatternTable, non_empty: bool, value: &[u8]) -> bool {
    let mut state = 1u8;
    for b in value {
        state &= table[*b as usize];
    }
    state == 1 && !(non_empty && value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_with_ranges() {
        let dfa = PatternDfa::compile("^[a-z0-9_]+$").unwrap();
        assert!(dfa.non_empty);
        assert!(dfa.matches(b"snake_case_1"));
        assert!(!dfa.matches(b"Upper"));
        assert!(!dfa.matches(b""));
    }

    #[test]
    fn test_star_accepts_empty() {
        let dfa = PatternDfa::compile("[\\d]*").unwrap();
        assert!(dfa.matches(b""));
        assert!(dfa.matches(b"0123"));
        assert!(!dfa.matches(b"12a"));
    }

    #[test]
    fn test_negated_class_and_literal_dash() {
        let dfa = PatternDfa::compile("[^ -]+").unwrap();
        assert!(dfa.matches(b"abc"));
        assert!(!dfa.matches(b"a b"));
        assert!(!dfa.matches(b"a-b"));
    }

    #[test]
    fn test_escapes_and_dot() {
        assert!(PatternDfa::compile("\\w+").unwrap().matches(b"Hello_42"));
        assert!(PatternDfa::compile(".*").unwrap().matches(b"\xff anything"));
        assert!(PatternDfa::compile("x").unwrap().matches(b"xxx"));
    }

    #[test]
    fn test_rejects_unsupported() {
        for bad in ["", "[a-z", "[z-a]+", "ab", "[a]+?", "\\"] {
            assert!(
                matches!(PatternDfa::compile(bad), Err(TickError::InvalidShape(_))),
                "{bad}"
            );
        }
    }
}
