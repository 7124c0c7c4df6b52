//! Copying foreign dictionaries out of callback frames

use tether_core::PropertyDictionary;

use crate::error::copy_string;
use crate::sys::RawDict;

/// Copy a foreign dictionary into an owned [`PropertyDictionary`].
///
/// Items with a null key are skipped; a null value becomes the empty
/// string. A null `dict` yields an empty dictionary.
///
/// # Safety
///
/// `dict` must be null or point to a dictionary whose `items` array holds
/// `n_items` entries, all valid for the duration of the call.
pub unsafe fn copy_dict(dict: *const RawDict) -> PropertyDictionary {
    let Some(dict) = dict.as_ref() else {
        return PropertyDictionary::new();
    };
    if dict.items.is_null() || dict.n_items == 0 {
        return PropertyDictionary::new();
    }

    let items = std::slice::from_raw_parts(dict.items, dict.n_items as usize);
    items
        .iter()
        .filter_map(|item| {
            let key = copy_string(item.key)?;
            let value = copy_string(item.value).unwrap_or_default();
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::ffi::c_char;

    use super::*;
    use crate::sys::RawDictItem;

    fn item(key: &'static [u8], value: &'static [u8]) -> RawDictItem {
        RawDictItem {
            key: key.as_ptr() as *const c_char,
            value: value.as_ptr() as *const c_char,
        }
    }

    #[test]
    fn test_copy_preserves_order() {
        let items = [
            item(b"node.name\0", b"mic\0"),
            item(b"media.class\0", b"Audio/Source\0"),
        ];
        let raw = RawDict {
            flags: 0,
            n_items: items.len() as u32,
            items: items.as_ptr(),
        };

        let props = unsafe { copy_dict(&raw) };
        let pairs: Vec<_> = props.iter().collect();
        assert_eq!(
            pairs,
            vec![("node.name", "mic"), ("media.class", "Audio/Source")]
        );
    }

    #[test]
    fn test_copy_null_and_partial_items() {
        assert!(unsafe { copy_dict(std::ptr::null()) }.is_empty());

        let items = [
            RawDictItem {
                key: std::ptr::null(),
                value: b"lost\0".as_ptr() as *const c_char,
            },
            RawDictItem {
                key: b"empty\0".as_ptr() as *const c_char,
                value: std::ptr::null(),
            },
        ];
        let raw = RawDict {
            flags: 0,
            n_items: 2,
            items: items.as_ptr(),
        };
        let props = unsafe { copy_dict(&raw) };
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("empty"), Some(""));
    }
}
