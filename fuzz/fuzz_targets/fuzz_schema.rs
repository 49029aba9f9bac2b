//! Fuzz target for `Schema::from_header`.
//!
//! Arbitrary header lines must either resolve or be rejected, never panic,
//! and every resolved column index must fall inside the header.

#![no_main]

use eventalign_collapse::schema::Schema;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(header) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(schema) = Schema::from_header(header) {
        let columns = [
            schema.ref_id,
            schema.read_id,
            schema.position,
            schema.ref_kmer,
            schema.model_kmer,
            schema.event_length,
        ];
        for column in columns {
            assert!(column < schema.n_fields);
        }
        if let Some((start, end)) = schema.signal_bounds {
            assert!(start < schema.n_fields && end < schema.n_fields);
        }
        if let Some(samples) = schema.samples {
            assert!(samples < schema.n_fields);
        }
    }
});
