#![no_main]

use libfuzzer_sys::fuzz_target;
use parallel_range::plan_parts;

fuzz_target!(|input: (u64, u64)| {
    let (length, part_size) = input;
    // Keep the part count bounded so the plan fits in memory.
    if part_size == 0 || length / part_size > 100_000 {
        return;
    }

    let parts = plan_parts(length, part_size).expect("non-zero part size must plan");
    let mut next = 0u64;
    for part in &parts {
        assert_eq!(part.start, next, "gap or overlap at {next}");
        assert!(part.end >= part.start);
        assert!(part.len() <= part_size);
        next = part.end + 1;
    }
    assert_eq!(next, length);
});
