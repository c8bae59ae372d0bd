#![no_main]

use dutycal_core::backend::Column;
use dutycal_core::event::codec::decode;
use dutycal_core::event::schema::READ_COLUMNS;
use libfuzzer_sys::fuzz_target;

// Input: repeated [name selector, timestamp byte, value length, value...].
fuzz_target!(|data: &[u8]| {
    let mut columns = Vec::new();
    let mut rest = data;
    while let [selector, ts, len, tail @ ..] = rest {
        let len = usize::from(*len).min(tail.len());
        let (value, next) = tail.split_at(len);
        let name = READ_COLUMNS
            .get(usize::from(*selector) % (READ_COLUMNS.len() + 2))
            .copied()
            .unwrap_or(if selector % 2 == 0 { "week" } else { "unknown" });
        columns.push(Column::new(name, value.to_vec(), i64::from(*ts)));
        rest = next;
    }

    if let Ok(event) = decode("fuzz", &columns, chrono_tz::Tz::UTC) {
        assert!(event.duration >= chrono::Duration::zero());
        assert_eq!(event.id, "fuzz");
    }
});
