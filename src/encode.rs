//! Component A — the Type Encoder (spec.md §4.A).
//!
//! Maps a function signature to three 64-bit encodings (`Normal`, `Short`,
//! `Precise`); the indirect-call type-ID allocator keys exclusively off
//! `Precise`. Collisions under `Precise` are intentional: two signatures
//! that hash the same are the equivalence class the CFI policy treats as
//! interchangeable for indirect dispatch (spec.md §4.A).

use crate::ir::TypeCode;
use hashbrown::HashMap;

/// A signature's code must stay below 32 so it folds into a base-32
/// accumulator without overflowing its own field.
const CODE_BITS_LIMIT: u16 = 32;

/// Maximum number of parameters the encoding distinguishes; signatures with
/// more fold to a single shared bucket (spec.md §4.A, "by design").
const MAX_ENCODED_PARAMS: usize = 7;

/// 5-bit code for one type, per the table in spec.md §4.A.
///
/// `recurse` controls whether a pointer's code includes its pointee's code
/// (`16 + code(pointee)`) or just the flat "pointer" code (`11`). The
/// pointee itself is always encoded with `recurse = false`: this is one
/// level of pointer recursion, not a recursive walk to the bottom of a
/// pointer chain, matching the reference encoder exactly.
pub fn encode_type(ty: &TypeCode, recurse: bool) -> u16 {
    let code = match ty {
        TypeCode::Void => 1,
        TypeCode::Int { bits } => match *bits {
            0..=1 => 2,
            2..=8 => 3,
            9..=16 => 4,
            17..=32 => 5,
            _ => 6,
        },
        TypeCode::Half => 7,
        TypeCode::Float => 8,
        TypeCode::Double => 9,
        TypeCode::ExtendedFloat => 10,
        TypeCode::Pointer(pointee) => {
            if recurse {
                return 16 + encode_type(pointee, false);
            }
            11
        }
        TypeCode::Struct => 12,
        TypeCode::Array => 13,
        TypeCode::Other => 14,
    };
    debug_assert!(code < CODE_BITS_LIMIT);
    code
}

/// Fold a signature's parameter codes (and, optionally, its return type's
/// code) into a base-32 accumulator, per spec.md §4.A.
///
/// `encode_pointers` selects recursive (`true`) vs. flat (`false`) pointer
/// coding for every parameter and the return type. `encode_return` selects
/// whether the return type contributes to the accumulator at all.
pub fn encode_function(
    signature: &crate::ir::Signature,
    encode_pointers: bool,
    encode_return: bool,
) -> u64 {
    if signature.params.len() >= 8 {
        // Degenerates to a single bucket: precision traded for fixed width
        // (spec.md §4.A, "this is by design").
        return 32;
    }

    let mut encoding: u64 = if encode_return {
        encode_type(&signature.ret, encode_pointers) as u64
    } else {
        32
    };

    for param in signature.params.iter().take(MAX_ENCODED_PARAMS) {
        encoding = encode_type(param, encode_pointers) as u64 + encoding * 32;
    }

    encoding
}

/// The three relevant encodings for one signature (spec.md §3).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SignatureEncoding {
    pub normal: u64,
    pub short: u64,
    pub precise: u64,
}

impl SignatureEncoding {
    pub fn of(signature: &crate::ir::Signature) -> Self {
        SignatureEncoding {
            normal: encode_function(signature, true, false),
            short: encode_function(signature, false, false),
            precise: encode_function(signature, true, true),
        }
    }
}

/// Allocates 32-bit type IDs downward from a ceiling, memoizing on each
/// signature's `Precise` encoding so that signatures producing the same
/// `Precise` value share one ID (spec.md §4.A).
#[derive(Debug)]
pub struct TypeEncoder {
    next_type_id: u32,
    encoding_to_id: HashMap<u64, u32>,
}

impl TypeEncoder {
    /// `ceiling` is the first ID handed out; subsequent distinct
    /// signatures consume the next one down (e.g. `0x7FFFE`, reserving
    /// `0x7FFFF` for [`crate::record::UNKNOWN_ID`]).
    pub fn new(ceiling: u32) -> Self {
        TypeEncoder {
            next_type_id: ceiling,
            encoding_to_id: HashMap::new(),
        }
    }

    /// Get (or allocate) the type ID for `signature`. Idempotent: calling
    /// this twice with signatures that share a `Precise` encoding returns
    /// the same ID both times (spec.md §8, property 7).
    pub fn get_type_id(&mut self, signature: &crate::ir::Signature) -> u32 {
        let precise = encode_function(signature, true, true);
        if let Some(&id) = self.encoding_to_id.get(&precise) {
            return id;
        }
        let id = self.next_type_id;
        log::debug!("new function type id {id}: precise encoding {precise:#x}");
        self.encoding_to_id.insert(precise, id);
        self.next_type_id -= 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Signature;

    fn int(bits: u32) -> TypeCode {
        TypeCode::Int { bits }
    }

    #[test]
    fn per_type_codes_match_table() {
        assert_eq!(encode_type(&TypeCode::Void, true), 1);
        assert_eq!(encode_type(&int(1), true), 2);
        assert_eq!(encode_type(&int(8), true), 3);
        assert_eq!(encode_type(&int(16), true), 4);
        assert_eq!(encode_type(&int(32), true), 5);
        assert_eq!(encode_type(&int(64), true), 6);
        assert_eq!(encode_type(&TypeCode::Half, true), 7);
        assert_eq!(encode_type(&TypeCode::Float, true), 8);
        assert_eq!(encode_type(&TypeCode::Double, true), 9);
        assert_eq!(encode_type(&TypeCode::ExtendedFloat, true), 10);
        assert_eq!(encode_type(&TypeCode::Struct, true), 12);
        assert_eq!(encode_type(&TypeCode::Array, true), 13);
        assert_eq!(encode_type(&TypeCode::Other, true), 14);
    }

    #[test]
    fn pointer_recursion_is_one_level_only() {
        // pointer to pointer to int32: recursive pass sees `16 + code(ptr,
        // non-recursive) = 16 + 11 = 27`, never descending into the int.
        let ty = TypeCode::Pointer(Box::new(TypeCode::Pointer(Box::new(int(32)))));
        assert_eq!(encode_type(&ty, true), 27);
        assert_eq!(encode_type(&ty, false), 11);
    }

    #[test]
    fn eight_or_more_params_degenerates_to_single_bucket() {
        let sig = Signature {
            params: vec![int(32); 8],
            ret: TypeCode::Void,
        };
        assert_eq!(encode_function(&sig, true, true), 32);
    }

    #[test]
    fn parameter_order_changes_precise_encoding() {
        let a = Signature {
            params: vec![int(32), TypeCode::Float],
            ret: TypeCode::Void,
        };
        let b = Signature {
            params: vec![TypeCode::Float, int(32)],
            ret: TypeCode::Void,
        };
        assert_ne!(
            SignatureEncoding::of(&a).precise,
            SignatureEncoding::of(&b).precise
        );
    }

    #[test]
    fn short_excludes_pointer_recursion_and_return_type() {
        let sig = Signature {
            params: vec![TypeCode::Pointer(Box::new(int(32)))],
            ret: TypeCode::Double,
        };
        let enc = SignatureEncoding::of(&sig);
        assert_ne!(enc.normal, enc.short);
        assert_ne!(enc.normal, enc.precise);
    }

    #[test]
    fn type_encoder_is_idempotent() {
        let sig = Signature {
            params: vec![int(32)],
            ret: TypeCode::Void,
        };
        let mut enc1 = TypeEncoder::new(0x7_FFFE);
        let id1a = enc1.get_type_id(&sig);
        let id1b = enc1.get_type_id(&sig);
        assert_eq!(id1a, id1b);

        let mut enc2 = TypeEncoder::new(0x7_FFFE);
        let id2 = enc2.get_type_id(&sig);
        assert_eq!(id1a, id2);
    }

    #[test]
    fn type_encoder_draws_ids_downward() {
        let mut enc = TypeEncoder::new(10);
        let sig_a = Signature {
            params: vec![int(8)],
            ret: TypeCode::Void,
        };
        let sig_b = Signature {
            params: vec![TypeCode::Double],
            ret: TypeCode::Void,
        };
        let id_a = enc.get_type_id(&sig_a);
        let id_b = enc.get_type_id(&sig_b);
        assert_eq!(id_a, 10);
        assert_eq!(id_b, 9);
    }

    #[test]
    fn colliding_signatures_share_a_type_id() {
        // Different `Normal`/`Short` encodings are fine; what must collide
        // is `Precise`. Two signatures with identical params and return
        // type always collide by definition, which is the simplest
        // confirming case that collision is plumbed through correctly.
        let sig = Signature {
            params: vec![int(32), TypeCode::Double],
            ret: TypeCode::Void,
        };
        let mut enc = TypeEncoder::new(100);
        let a = enc.get_type_id(&sig);
        let b = enc.get_type_id(&sig.clone());
        assert_eq!(a, b);
    }
}
