//! Proptest generators for property-based testing.

use proptest::prelude::*;

use file_grants_core::{
    AccessMode, Blake3Hash, DirtyPolicy, FileIdentity, FileLocation, FileSignature, GrantKey,
    Origin,
};

/// Generate a random GrantKey.
pub fn grant_key() -> impl Strategy<Value = GrantKey> {
    any::<[u8; 32]>().prop_map(GrantKey::from_bytes)
}

/// Generate a well-formed origin.
pub fn origin() -> impl Strategy<Value = Origin> {
    ("(https|http)", "[a-z][a-z0-9-]{0,15}", "(com|org|example|test)").prop_filter_map(
        "origin must be valid",
        |(scheme, host, tld)| Origin::new(format!("{}://{}.{}", scheme, host, tld)).ok(),
    )
}

/// Generate two origins that are guaranteed to differ.
pub fn distinct_origins() -> impl Strategy<Value = (Origin, Origin)> {
    (origin(), origin()).prop_filter("origins must differ", |(a, b)| a != b)
}

/// Generate an AccessMode.
pub fn access_mode() -> impl Strategy<Value = AccessMode> {
    prop_oneof![Just(AccessMode::ReadOnly), Just(AccessMode::ReadWrite)]
}

/// Generate a DirtyPolicy.
pub fn dirty_policy() -> impl Strategy<Value = DirtyPolicy> {
    prop_oneof![
        Just(DirtyPolicy::AlwaysDirty),
        Just(DirtyPolicy::NeverDirty),
        Just(DirtyPolicy::ChangedSinceLastAccess),
    ]
}

/// Generate a FileIdentity.
pub fn file_identity() -> impl Strategy<Value = FileIdentity> {
    (any::<u64>(), any::<u64>()).prop_map(|(volume, object)| FileIdentity::new(volume, object))
}

/// Generate a file signature, with or without a digest.
pub fn signature() -> impl Strategy<Value = FileSignature> {
    (
        0i64..=i64::MAX / 2,
        any::<u64>(),
        proptest::option::of(any::<[u8; 32]>()),
    )
        .prop_map(|(modified_ns, len, digest)| FileSignature {
            modified_ns,
            len,
            digest: digest.map(Blake3Hash),
        })
}

/// Generate a plain file name.
pub fn file_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_][a-zA-Z0-9_. -]{0,23}\\.(txt|md|pdf|png)".prop_map(String::from)
}

/// Generate a file location under an absolute directory.
pub fn file_location() -> impl Strategy<Value = FileLocation> {
    (prop::collection::vec("[a-z0-9]{1,8}", 0..4), file_name()).prop_map(|(dirs, name)| {
        let directory = format!("/{}", dirs.join("/"));
        FileLocation::new(directory, name)
    })
}

/// File contents.
pub fn content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}
