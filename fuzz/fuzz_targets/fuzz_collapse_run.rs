//! Fuzz target for `collapse_run`.
//!
//! Feeds arbitrary text as the rows of a single run and checks that
//! collapsing either fails with an error or yields a consistent block.

#![no_main]

use eventalign_collapse::aggregate::{collapse_run, Layout};
use eventalign_collapse::reader::Run;
use eventalign_collapse::schema::Schema;
use eventalign_collapse::stats::StatField;
use libfuzzer_sys::fuzz_target;

const HEADER: &str = "contig\tread_name\tposition\treference_kmer\tmodel_kmer\tevent_length\tstart_idx\tend_idx\tsamples";

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    if lines.is_empty() {
        return;
    }

    let schema = Schema::from_header(HEADER).unwrap();
    let layout = Layout::new(&schema, &StatField::DEFAULT, true);
    let run = Run {
        read_id: "R".to_string(),
        ref_id: "C".to_string(),
        first_line: 2,
        lines,
    };

    if let Ok((read, block)) = collapse_run(&run, &schema, &layout) {
        assert!(block.starts_with("#R\tC\n"));
        assert!(block.ends_with('\n'));
        // One marker line, one header line, then one row per kmer.
        assert_eq!(block.lines().count() as u64, read.kmers + 2);
        assert!(read.kmers >= 1);
    }
});
