use uuid::Uuid;

/// Random (v4) UUID, suitable for `uuid` columns.
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Time-based (v1) UUID, suitable for `timeuuid` columns.
///
/// The node id is random per call; clustering order only depends on the
/// timestamp bits.
pub fn generate_timeuuid() -> Uuid {
    let seed = Uuid::new_v4();
    let mut node = [0u8; 6];
    node.copy_from_slice(&seed.as_bytes()[..6]);
    Uuid::now_v1(&node)
}
