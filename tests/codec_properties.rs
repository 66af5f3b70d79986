// tests/codec_properties.rs

use std::path::PathBuf;

use proptest::prelude::*;

use fsevent_bridge::flags::{decode, decode_create, encode};
use fsevent_bridge::marshal::{from_native_string, to_native_array};
use fsevent_bridge::{CreateFlags, CreateOptions, EventFlags};

fn create_flags() -> impl Strategy<Value = CreateFlags> {
    any::<u32>().prop_map(|bits| CreateFlags::from_bits_truncate(bits) & CreateFlags::SUPPORTED)
}

// Absolute paths built from printable, NUL-free components.
fn path_list() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(
        proptest::collection::vec("[a-zA-Z0-9 ._ü-]{1,12}", 1..5)
            .prop_map(|parts| format!("/{}", parts.join("/"))),
        0..8,
    )
}

proptest! {
    #[test]
    fn create_flags_round_trip(flags in create_flags(), latency_ms in 0u64..5_000) {
        let options = CreateOptions::new(flags)
            .with_latency(std::time::Duration::from_millis(latency_ms));
        prop_assert_eq!(decode_create(encode(&options)), flags);
    }

    #[test]
    fn event_flags_keep_every_bit(bits in any::<u32>()) {
        let flags = decode(bits);
        prop_assert_eq!(flags.bits(), bits);
        prop_assert_eq!(flags.unrecognized() & EventFlags::all().bits(), 0);
    }

    #[test]
    fn paths_round_trip_in_order(paths in path_list()) {
        let array = to_native_array(&paths).unwrap();
        let back: Vec<String> = array
            .as_ptrs()
            .into_iter()
            .map(|p| unsafe { from_native_string(p) })
            .collect();
        prop_assert_eq!(back, paths);
    }

    #[test]
    fn pathbufs_marshal_like_strings(paths in path_list()) {
        let bufs: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();
        let array = to_native_array(&bufs).unwrap();
        prop_assert_eq!(array.to_strings(), paths);
    }
}
