use proptest::prelude::*;
use tinyscan::{error::ScanError, port::PortSpec};

proptest! {
    #[test]
    fn range_yields_every_port_in_order(start in 0u64..70_000, width in 0u64..300) {
        let end = start + width;
        let spec: PortSpec = format!("{}-{}", start, end).parse().unwrap();

        prop_assert_eq!(spec.iter().collect::<Vec<_>>(), (start..=end).collect::<Vec<_>>());
    }

    #[test]
    fn single_port_yields_itself(port in any::<u64>()) {
        let spec: PortSpec = port.to_string().parse().unwrap();

        prop_assert_eq!(spec.iter().collect::<Vec<_>>(), vec![port]);
    }

    #[test]
    fn inverted_range_is_rejected(end in 0u64..65_535, gap in 1u64..1000) {
        let start = end + gap;
        let parsed = format!("{}-{}", start, end).parse::<PortSpec>();

        prop_assert!(
            matches!(parsed, Err(ScanError::InvertedRange { start: s, end: e }) if s == start && e == end),
            "expected InvertedRange {{ start: {}, end: {} }}, got {:?}", start, end, parsed
        );
    }

    #[test]
    fn non_numeric_input_is_rejected(raw in "[a-zA-Z ,.]{1,12}") {
        prop_assert!(matches!(raw.parse::<PortSpec>(), Err(ScanError::InvalidPortSpec(_))));
    }
}
