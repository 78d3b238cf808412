//! Secondary-index maintenance: delete-old / insert-new deltas.

use crate::codec::IndexKeyCodec;
use crate::error::{TabxError, TabxResult};
use crate::record::{KeyPart, Record, display_key};
use crate::storage::{ReadonlyStore, WriteOp};

/// Index operations for saving `new` over `old` (absent on insert).
///
/// Unchanged entries are skipped. Unique indexes are checked against `store`,
/// which should be the writer's buffered view so earlier staged saves count.
pub(crate) fn plan_save<T: Record>(
    codecs: &[IndexKeyCodec],
    store: &dyn ReadonlyStore,
    old: Option<&T>,
    new: &T,
    primary_key: &[KeyPart],
) -> TabxResult<Vec<WriteOp>> {
    let mut ops = Vec::new();
    for codec in codecs {
        let new_values = new.key_values(codec.fields())?;
        let new_key = codec.encode_key(&new_values, primary_key)?;
        let old_key = match old {
            Some(old) => Some(codec.encode_key(&old.key_values(codec.fields())?, primary_key)?),
            None => None,
        };
        if old_key.as_deref() == Some(new_key.as_slice()) {
            continue;
        }

        if codec.is_unique() {
            if let Some(owner) = store.get(&new_key)? {
                if codec.decode_value(&owner)? != primary_key {
                    return Err(TabxError::UniqueKeyViolation {
                        type_name: T::TYPE_NAME.to_string(),
                        index: codec.name(),
                        key: display_key(&new_values),
                    });
                }
            }
        }

        if let Some(key) = old_key {
            ops.push(WriteOp::Delete { key });
        }
        ops.push(WriteOp::Set {
            key: new_key,
            value: codec.encode_value(primary_key)?,
        });
    }
    Ok(ops)
}

/// Index deletions for removing `old`.
pub(crate) fn plan_delete<T: Record>(
    codecs: &[IndexKeyCodec],
    old: &T,
    primary_key: &[KeyPart],
) -> TabxResult<Vec<WriteOp>> {
    codecs
        .iter()
        .map(|codec| {
            let values = old.key_values(codec.fields())?;
            Ok(WriteOp::Delete {
                key: codec.encode_key(&values, primary_key)?,
            })
        })
        .collect()
}
