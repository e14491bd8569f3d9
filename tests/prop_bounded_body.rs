// Property tests for the byte-ceiling stream adapter
//
// Whatever the chunking, a body of n bytes is accepted iff n <= limit, and an
// accepted body is delivered intact.

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use media_gate::bounded_stream::{collect_bounded, BoundedBody};
use media_gate::error::GatewayError;
use proptest::prelude::*;
use std::convert::Infallible;
use std::time::Duration;

fn chunks() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16)
}

fn as_stream(parts: &[Vec<u8>]) -> impl futures_util::Stream<Item = Result<Bytes, Infallible>> + Unpin {
    stream::iter(
        parts
            .iter()
            .map(|p| Ok(Bytes::from(p.clone())))
            .collect::<Vec<_>>(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Collecting succeeds exactly when the total fits the ceiling
    #[test]
    fn prop_collect_respects_ceiling(parts in chunks(), limit in 0u64..600) {
        let total: usize = parts.iter().map(Vec::len).sum();
        let expected: Vec<u8> = parts.concat();

        let result = tokio_test::block_on(async {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            collect_bounded(as_stream(&parts), limit, deadline, Duration::from_secs(5)).await
        });

        if total as u64 <= limit {
            let body = result.unwrap();
            prop_assert_eq!(body.as_ref(), expected.as_slice());
        } else {
            let is_too_large = matches!(result, Err(GatewayError::TooLarge { .. }));
            prop_assert!(is_too_large);
        }
    }

    /// After a breach the adapter yields nothing further
    #[test]
    fn prop_adapter_terminates_after_breach(parts in chunks(), limit in 0u64..200) {
        let total: u64 = parts.iter().map(|p| p.len() as u64).sum();
        prop_assume!(total > limit);

        let items: Vec<_> = tokio_test::block_on(
            BoundedBody::new(as_stream(&parts), limit).collect::<Vec<_>>(),
        );

        let errors = items.iter().filter(|item| item.is_err()).count();
        prop_assert_eq!(errors, 1);
        let last_is_error = matches!(items.last(), Some(Err(GatewayError::TooLarge { .. })));
        prop_assert!(last_is_error);

        let delivered: u64 = items
            .iter()
            .filter_map(|item| item.as_ref().ok())
            .map(|chunk| chunk.len() as u64)
            .sum();
        prop_assert!(delivered <= limit);
    }
}
