// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Bidirectional token ↔ id mapping with four reserved entries:
//
//   UNK   "UNK"   — stands in for any out-of-vocabulary word
//   BEGIN "#"     — first position of every encoded caption
//   END   "#END"  — label of the last position
//   PAD   "#PAD"  — filler; usually the sentinel -1, which is
//                   never a valid embedding row
//
// The mapping is validated once at construction and is
// immutable afterwards. `size()` is the number of embedding
// rows the decoder needs (every id except PAD lies in 0..size).
//
// Reference: Rust Book §8 (HashMaps)

use std::collections::HashMap;

use crate::domain::error::PipelineError;

/// Integer id of one token. Signed so PAD can be -1.
pub type TokenId = i32;

pub const UNK_TOKEN:   &str = "UNK";
pub const BEGIN_TOKEN: &str = "#";
pub const END_TOKEN:   &str = "#END";
pub const PAD_TOKEN:   &str = "#PAD";

/// Padding id used when the mapping has no explicit PAD entry.
pub const DEFAULT_PAD_ID: TokenId = -1;

#[derive(Debug, Clone)]
pub struct Vocabulary {
    to_id:    HashMap<String, TokenId>,
    to_token: HashMap<TokenId, String>,
    size:     usize,
    pad:      TokenId,
    unk:      TokenId,
    begin:    TokenId,
    end:      TokenId,
}

impl Vocabulary {
    /// Validate a raw token → id mapping and freeze it.
    pub fn from_mapping(mapping: HashMap<String, TokenId>) -> Result<Self, PipelineError> {
        let reserved = |name: &str| {
            mapping
                .get(name)
                .copied()
                .ok_or_else(|| PipelineError::MissingReservedToken(name.to_string()))
        };
        let unk   = reserved(UNK_TOKEN)?;
        let begin = reserved(BEGIN_TOKEN)?;
        let end   = reserved(END_TOKEN)?;
        let pad   = mapping.get(PAD_TOKEN).copied().unwrap_or(DEFAULT_PAD_ID);

        // Ids of real embedding rows: everything except the PAD entry.
        let size = mapping.keys().filter(|t| t.as_str() != PAD_TOKEN).count();

        let mut to_token: HashMap<TokenId, String> = HashMap::with_capacity(mapping.len());
        for (token, &id) in &mapping {
            if token == PAD_TOKEN {
                continue;
            }
            if id < 0 || id as usize >= size {
                return Err(PipelineError::TokenIdOutOfRange {
                    token: token.clone(),
                    id,
                    size,
                });
            }
            if let Some(first) = to_token.insert(id, token.clone()) {
                let (first, second) = if first < *token {
                    (first, token.clone())
                } else {
                    (token.clone(), first)
                };
                return Err(PipelineError::DuplicateTokenId { id, first, second });
            }
        }
        if to_token.contains_key(&pad) {
            return Err(PipelineError::PadCollision(pad));
        }
        to_token.insert(pad, PAD_TOKEN.to_string());

        let mut to_id = mapping;
        to_id.insert(PAD_TOKEN.to_string(), pad);

        Ok(Self { to_id, to_token, size, pad, unk, begin, end })
    }

    /// Id of `token`, or UNK when the token is unknown.
    pub fn lookup(&self, token: &str) -> TokenId {
        self.to_id.get(token).copied().unwrap_or(self.unk)
    }

    /// Id of `token` only if it is in the vocabulary.
    pub fn get(&self, token: &str) -> Option<TokenId> {
        self.to_id.get(token).copied()
    }

    pub fn token(&self, id: TokenId) -> Option<&str> {
        self.to_token.get(&id).map(String::as_str)
    }

    /// Number of embedding rows (PAD excluded).
    pub fn size(&self) -> usize { self.size }

    pub fn pad(&self)   -> TokenId { self.pad }
    pub fn unk(&self)   -> TokenId { self.unk }
    pub fn begin(&self) -> TokenId { self.begin }
    pub fn end(&self)   -> TokenId { self.end }

    /// True for the markers stripped when decoding (PAD, BEGIN, END).
    pub fn is_marker(&self, id: TokenId) -> bool {
        id == self.pad || id == self.begin || id == self.end
    }

    /// Mapping in id order, PAD included. Used when writing the vocabulary to disk.
    pub fn to_mapping(&self) -> Vec<(String, TokenId)> {
        let mut pairs: Vec<(String, TokenId)> = self
            .to_id
            .iter()
            .map(|(t, &id)| (t.clone(), id))
            .collect();
        pairs.sort_by_key(|(_, id)| *id);
        pairs
    }
}
