//! Chat payload parsing on arbitrary text.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomfeed_proto::ChatRecord;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(record) = ChatRecord::from_json(text) {
        let json = record.to_json().expect("decoded record encodes");
        let again = ChatRecord::from_json(&json).expect("encoded record decodes");
        assert_eq!(again.content, record.content);
        assert_eq!(again.id, record.id);
    }
    let _ = ChatRecord::list_from_json(text);
});
