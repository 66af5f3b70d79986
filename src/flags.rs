// src/flags.rs

//! Conversion between native bitmasks and named flag sets.
//!
//! Values match `FSEventStreamCreateFlags` / `FSEventStreamEventFlags` from
//! `<CoreServices/FSEvents.h>`. Decoding never drops bits: anything the
//! native service sets that has no name here stays in the set and is
//! reported by [`EventFlags::unrecognized`].

use std::fmt;

use crate::types::CreateOptions;

bitflags::bitflags! {
    /// Capability flags for stream creation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CreateFlags: u32 {
        /// Paths arrive as `CFString`s instead of C strings.
        const USE_CF_TYPES = 0x0000_0001;
        /// Deliver on the leading edge of the latency window.
        const NO_DEFER = 0x0000_0002;
        /// Report changes along the ancestry of watched paths.
        const WATCH_ROOT = 0x0000_0004;
        /// Suppress events caused by this process.
        const IGNORE_SELF = 0x0000_0008;
        /// Per-file instead of per-directory events.
        const FILE_EVENTS = 0x0000_0010;
        /// Tag events caused by this process with `OWN_EVENT`.
        const MARK_SELF = 0x0000_0020;
        const USE_EXTENDED_DATA = 0x0000_0040;
        const FULL_HISTORY = 0x0000_0080;
    }
}

impl CreateFlags {
    /// Flags the bridge can honour. The callback only decodes C-string path
    /// arrays, so the CF-typed and extended-data layouts are excluded.
    pub const SUPPORTED: CreateFlags = CreateFlags::NO_DEFER
        .union(CreateFlags::WATCH_ROOT)
        .union(CreateFlags::IGNORE_SELF)
        .union(CreateFlags::FILE_EVENTS)
        .union(CreateFlags::MARK_SELF)
        .union(CreateFlags::FULL_HISTORY);
}

impl Default for CreateFlags {
    fn default() -> Self {
        CreateFlags::empty()
    }
}

bitflags::bitflags! {
    /// Per-event flags reported with every notification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventFlags: u32 {
        const MUST_SCAN_SUB_DIRS = 0x0000_0001;
        const USER_DROPPED = 0x0000_0002;
        const KERNEL_DROPPED = 0x0000_0004;
        const EVENT_IDS_WRAPPED = 0x0000_0008;
        const HISTORY_DONE = 0x0000_0010;
        const ROOT_CHANGED = 0x0000_0020;
        const MOUNT = 0x0000_0040;
        const UNMOUNT = 0x0000_0080;
        const ITEM_CREATED = 0x0000_0100;
        const ITEM_REMOVED = 0x0000_0200;
        const ITEM_INODE_META_MOD = 0x0000_0400;
        /// No destination path is reported for renames.
        const ITEM_RENAMED = 0x0000_0800;
        const ITEM_MODIFIED = 0x0000_1000;
        const ITEM_FINDER_INFO_MOD = 0x0000_2000;
        const ITEM_CHANGE_OWNER = 0x0000_4000;
        const ITEM_XATTR_MOD = 0x0000_8000;
        const ITEM_IS_FILE = 0x0001_0000;
        const ITEM_IS_DIR = 0x0002_0000;
        const ITEM_IS_SYMLINK = 0x0004_0000;
        const OWN_EVENT = 0x0008_0000;
        const ITEM_IS_HARDLINK = 0x0010_0000;
        const ITEM_IS_LAST_HARDLINK = 0x0020_0000;
        const ITEM_CLONED = 0x0040_0000;
    }
}

impl EventFlags {
    /// Flags only produced when the stream was created with `FILE_EVENTS`.
    pub const ITEM_LEVEL: EventFlags = EventFlags::from_bits_truncate(0x007f_ff00);

    /// Flags meaning "cached state for this subtree is stale, rescan".
    pub const RESCAN: EventFlags = EventFlags::MUST_SCAN_SUB_DIRS
        .union(EventFlags::USER_DROPPED)
        .union(EventFlags::KERNEL_DROPPED);

    /// Bits set by the native service that have no name in this crate.
    pub fn unrecognized(&self) -> u32 {
        self.bits() & !EventFlags::all().bits()
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        EventFlags::empty()
    }
}

const EVENT_FLAG_NAMES: &[(EventFlags, &str)] = &[
    (EventFlags::MUST_SCAN_SUB_DIRS, "MustScanSubDirs"),
    (EventFlags::USER_DROPPED, "UserDropped"),
    (EventFlags::KERNEL_DROPPED, "KernelDropped"),
    (EventFlags::EVENT_IDS_WRAPPED, "EventIdsWrapped"),
    (EventFlags::HISTORY_DONE, "HistoryDone"),
    (EventFlags::ROOT_CHANGED, "RootChanged"),
    (EventFlags::MOUNT, "Mount"),
    (EventFlags::UNMOUNT, "Unmount"),
    (EventFlags::ITEM_CREATED, "ItemCreated"),
    (EventFlags::ITEM_REMOVED, "ItemRemoved"),
    (EventFlags::ITEM_INODE_META_MOD, "ItemInodeMetaMod"),
    (EventFlags::ITEM_RENAMED, "ItemRenamed"),
    (EventFlags::ITEM_MODIFIED, "ItemModified"),
    (EventFlags::ITEM_FINDER_INFO_MOD, "ItemFinderInfoMod"),
    (EventFlags::ITEM_CHANGE_OWNER, "ItemChangeOwner"),
    (EventFlags::ITEM_XATTR_MOD, "ItemXattrMod"),
    (EventFlags::ITEM_IS_FILE, "ItemIsFile"),
    (EventFlags::ITEM_IS_DIR, "ItemIsDir"),
    (EventFlags::ITEM_IS_SYMLINK, "ItemIsSymlink"),
    (EventFlags::OWN_EVENT, "OwnEvent"),
    (EventFlags::ITEM_IS_HARDLINK, "ItemIsHardlink"),
    (EventFlags::ITEM_IS_LAST_HARDLINK, "ItemIsLastHardlink"),
    (EventFlags::ITEM_CLONED, "ItemCloned"),
];

/// Prints native-style names joined by `|`, e.g. `ItemCreated|ItemIsFile`.
/// Unrecognized residual bits are appended in hex.
impl fmt::Display for EventFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in EVENT_FLAG_NAMES {
            if self.contains(*flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        let residual = self.unrecognized();
        if residual != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{residual:#x}")?;
            first = false;
        }
        if first {
            f.write_str("None")?;
        }
        Ok(())
    }
}

/// Encode the capability flags of `options` into the native bitmask.
pub fn encode(options: &CreateOptions) -> u32 {
    options.flags.bits()
}

/// Decode a native create-flags word, keeping unknown bits.
pub fn decode_create(raw: u32) -> CreateFlags {
    CreateFlags::from_bits_retain(raw)
}

/// Decode a native per-event flags word, keeping unknown bits.
pub fn decode(raw: u32) -> EventFlags {
    EventFlags::from_bits_retain(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_event_bits_survive_decoding() {
        let raw = EventFlags::ITEM_CREATED.bits() | 0x8000_0000;
        let flags = decode(raw);
        assert!(flags.contains(EventFlags::ITEM_CREATED));
        assert_eq!(flags.unrecognized(), 0x8000_0000);
        assert_eq!(flags.bits(), raw);
    }

    #[test]
    fn every_named_event_flag_round_trips() {
        for (flag, _) in EVENT_FLAG_NAMES {
            assert_eq!(decode(flag.bits()), *flag);
        }
        assert_eq!(EVENT_FLAG_NAMES.len(), EventFlags::all().iter().count());
    }

    #[test]
    fn item_level_mask_covers_file_granularity_flags() {
        assert!(EventFlags::ITEM_LEVEL.contains(EventFlags::ITEM_CREATED));
        assert!(EventFlags::ITEM_LEVEL.contains(EventFlags::ITEM_CLONED));
        assert!(!EventFlags::ITEM_LEVEL.contains(EventFlags::UNMOUNT));
        assert!(!EventFlags::ITEM_LEVEL.contains(EventFlags::MUST_SCAN_SUB_DIRS));
    }

    #[test]
    fn display_uses_native_names() {
        let flags = EventFlags::ITEM_CREATED | EventFlags::ITEM_IS_FILE;
        assert_eq!(flags.to_string(), "ItemCreated|ItemIsFile");
        assert_eq!(EventFlags::empty().to_string(), "None");
        assert_eq!(
            decode(EventFlags::MOUNT.bits() | 0x0100_0000).to_string(),
            "Mount|0x1000000"
        );
    }

    #[test]
    fn encode_matches_native_constants() {
        let opts = CreateOptions::new(CreateFlags::NO_DEFER | CreateFlags::FILE_EVENTS);
        assert_eq!(encode(&opts), 0x12);
        assert_eq!(decode_create(0x12), opts.flags);
    }
}
