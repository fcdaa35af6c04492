#![no_main]

use libfuzzer_sys::fuzz_target;
use parallel_range::ObjectPath;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(path) = ObjectPath::parse(input) {
        assert!(!path.container.is_empty());
        assert!(!path.key.is_empty());

        // A parsed path must print back to something that parses the same way.
        let reparsed = ObjectPath::parse(&path.to_string()).expect("display output must parse");
        assert_eq!(reparsed, path);
        assert!(!path.file_name().contains('/'));
    }
});
