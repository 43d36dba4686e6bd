// src/core/dispatch/quorum.rs

//! Quorum arithmetic (§4.1.1): raw quorum by policy, downgraded or rejected
//! when it exceeds the target node-set size.

use crate::core::errors::CoordError;
use crate::core::task::QuorumType;
use crate::core::metrics::QUORUM_DOWNGRADES_TOTAL;

/// Computes the effective quorum for a dispatch targeting `queue_size` nodes.
pub fn compute_quorum(
    database: &str,
    quorum_type: QuorumType,
    queue_size: usize,
    read_quorum: usize,
    write_quorum: usize,
    fail_when_available_less_than_quorum: bool,
) -> Result<usize, CoordError> {
    let raw_quorum = match quorum_type {
        QuorumType::None => 0,
        QuorumType::Read => read_quorum,
        QuorumType::Write => write_quorum,
        QuorumType::All => queue_size,
    };

    if raw_quorum > queue_size {
        if fail_when_available_less_than_quorum {
            return Err(CoordError::QuorumUnreachable {
                quorum: raw_quorum,
                available: queue_size,
            });
        }
        QUORUM_DOWNGRADES_TOTAL
            .with_label_values(&[database])
            .inc();
        return Ok(queue_size);
    }
    Ok(raw_quorum)
}
