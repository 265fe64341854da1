//! Structural hashing for expression nodes.
//!
//! A token is a blake3 digest over an operator kind and its ordered operand
//! sequence. Nested nodes contribute their *already-computed* token bytes,
//! never their full structure, so hashing a DAG is O(node count).
//!
//! Determinism: tokens are stable within a process. Operands carried as
//! `Operand::Json` are digested through their `serde_json` byte encoding;
//! that encoding is canonical for the JSON data model, but callers must not
//! rely on cross-process token equality for foreign payloads they do not
//! control.

use std::fmt;

use crate::error::{Error, Result};
use crate::kind::OpKind;
use crate::operand::Operand;

/// Structural digest identifying a node's operator kind + operand content.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token([u8; 32]);

impl Token {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex form used in node names (first 8 bytes).
    pub fn short(&self) -> String {
        self.0[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Full hex form used in the persisted representation.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Parse the full hex form back into a token.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 64 {
            return Err(Error::Persist(format!(
                "token hex must be 64 chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_val(chunk[0])?;
            let lo = hex_val(chunk[1])?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Token(bytes))
    }
}

fn hex_val(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::Persist(format!("invalid hex char '{}'", c as char))),
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.short())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Compute the structural token for `(kind, operands)`.
pub fn token_of(kind: OpKind, operands: &[Operand]) -> Result<Token> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.prefix().as_bytes());
    hasher.update(&[0u8]);
    for operand in operands {
        hash_operand(&mut hasher, operand)?;
    }
    Ok(Token(*hasher.finalize().as_bytes()))
}

// Each operand is framed with a tag byte so that adjacent operands of
// different variants can never collide byte-wise.
fn hash_operand(hasher: &mut blake3::Hasher, operand: &Operand) -> Result<()> {
    match operand {
        Operand::Node(node) => {
            hasher.update(&[1u8]);
            hasher.update(node.token().as_bytes());
        }
        Operand::Bool(b) => {
            hasher.update(&[2u8, *b as u8]);
        }
        Operand::Int(i) => {
            hasher.update(&[3u8]);
            hasher.update(&i.to_le_bytes());
        }
        Operand::UInt(u) => {
            hasher.update(&[4u8]);
            hasher.update(&u.to_le_bytes());
        }
        Operand::Str(s) => {
            hasher.update(&[5u8]);
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Operand::Columns(cols) => {
            hasher.update(&[6u8]);
            hasher.update(&(cols.len() as u64).to_le_bytes());
            for col in cols {
                hasher.update(&(col.len() as u64).to_le_bytes());
                hasher.update(col.as_bytes());
            }
        }
        Operand::Predicate(expr) => {
            hasher.update(&[7u8]);
            let bytes = serde_json::to_vec(expr)
                .map_err(|e| Error::Tokenization(format!("predicate: {}", e)))?;
            hasher.update(&bytes);
        }
        Operand::Json(value) => {
            hasher.update(&[8u8]);
            let bytes = serde_json::to_vec(value)
                .map_err(|e| Error::Tokenization(format!("json operand: {}", e)))?;
            hasher.update(&bytes);
        }
        Operand::Legacy(graph) => {
            hasher.update(&[9u8]);
            hasher.update(&graph.fingerprint());
        }
        Operand::None => {
            hasher.update(&[10u8]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_deterministic() {
        let ops = vec![
            Operand::Str("data.parquet".into()),
            Operand::Columns(vec!["a".into(), "b".into()]),
        ];
        let t1 = token_of(OpKind::Read, &ops).unwrap();
        let t2 = token_of(OpKind::Read, &ops).unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn test_token_kind_sensitive() {
        let ops = vec![Operand::Str("x".into())];
        let t1 = token_of(OpKind::Read, &ops).unwrap();
        let t2 = token_of(OpKind::Project, &ops).unwrap();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_token_operand_order_sensitive() {
        let a = Operand::Str("a".into());
        let b = Operand::Str("b".into());
        let t1 = token_of(OpKind::Read, &[a.clone(), b.clone()]).unwrap();
        let t2 = token_of(OpKind::Read, &[b, a]).unwrap();
        assert_ne!(t1, t2);
    }

    #[test]
    fn test_token_hex_round_trip() {
        let t = token_of(OpKind::Read, &[Operand::UInt(7)]).unwrap();
        let restored = Token::from_hex(&t.to_hex()).unwrap();
        assert_eq!(t, restored);
    }

    #[test]
    fn test_columns_not_confusable_with_str() {
        // ["ab"] and ["a", "b"] must hash differently.
        let t1 = token_of(OpKind::Read, &[Operand::Columns(vec!["ab".into()])]).unwrap();
        let t2 =
            token_of(OpKind::Read, &[Operand::Columns(vec!["a".into(), "b".into()])]).unwrap();
        assert_ne!(t1, t2);
    }
}
