use crate::api::{ApiError, ApiFut};
use crate::codec::MethodCodec;
use crate::context::CallContext;
use crate::error::Result;
use crate::protocol::RpcMethod;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerFut = Pin<Box<dyn Future<Output = Result<Bytes>> + Send>>;

/// Byte-in/byte-out callback serving one protocol id
pub type RequestHandler = Arc<dyn Fn(CallContext, Bytes) -> HandlerFut + Send + Sync>;

/// Wrap a method codec and an API invocation into a request handler.
///
/// Undecodable request bytes never reach the API: the handler answers with a
/// `MalformedRequest` error envelope instead. API failures are encoded the
/// same way, so the handler only fails outright when the success value cannot
/// be serialized.
pub fn make_request_handler<M, A, F>(
    api: Arc<A>,
    codec: MethodCodec<M>,
    invoke: Arc<F>,
) -> RequestHandler
where
    M: RpcMethod,
    A: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<A>, CallContext, M::Args) -> ApiFut<'static, M::Output> + Send + Sync + 'static,
{
    Arc::new(move |ctx: CallContext, request: Bytes| -> HandlerFut {
        let args = match codec.unpack_request(&request) {
            Ok(args) => args,
            Err(e) => {
                tracing::debug!(
                    "Rejecting malformed {} request from {:?}: {}",
                    M::NAME,
                    ctx.peer(),
                    e
                );
                let payload = codec.pack_error(&ApiError::MalformedRequest(e.to_string()));
                return Box::pin(async move { Ok(payload) });
            }
        };

        if ctx.is_cancelled() {
            let payload = codec.pack_error(&ApiError::Cancelled);
            return Box::pin(async move { Ok(payload) });
        }

        let call = invoke(Arc::clone(&api), ctx, args);
        Box::pin(async move { codec.pack_response(call.await) })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{GetBalance, GetNumShards};
    use crate::types::{Address, BlockReference, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        calls: AtomicUsize,
    }

    fn balance_handler(api: Arc<Counter>) -> RequestHandler {
        make_request_handler(
            api,
            MethodCodec::<GetBalance>::new(),
            Arc::new(
                |api: Arc<Counter>,
                 _ctx: CallContext,
                 (address, _block): (Address, BlockReference)|
                 -> ApiFut<'static, Value> {
                    Box::pin(async move {
                        api.calls.fetch_add(1, Ordering::SeqCst);
                        if address == Address([0; 20]) {
                            Err(ApiError::NotFound("zero address".into()))
                        } else {
                            Ok(Value(u128::from(address.0[0])))
                        }
                    })
                },
            ),
        )
    }

    #[tokio::test]
    async fn test_handler_decodes_and_invokes() {
        let api = Arc::new(Counter {
            calls: AtomicUsize::new(0),
        });
        let handler = balance_handler(Arc::clone(&api));
        let codec = MethodCodec::<GetBalance>::new();

        let request = codec
            .pack_request((Address([7; 20]), BlockReference::Latest))
            .unwrap();
        let response = handler(CallContext::background(), request).await.unwrap();
        assert_eq!(codec.unpack_response(&response).unwrap(), Ok(Value(7)));
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_encodes_api_error() {
        let api = Arc::new(Counter {
            calls: AtomicUsize::new(0),
        });
        let handler = balance_handler(api);
        let codec = MethodCodec::<GetBalance>::new();

        let request = codec
            .pack_request((Address([0; 20]), BlockReference::Latest))
            .unwrap();
        let response = handler(CallContext::background(), request).await.unwrap();
        assert_eq!(
            codec.unpack_response(&response).unwrap(),
            Err(ApiError::NotFound("zero address".into()))
        );
    }

    #[tokio::test]
    async fn test_malformed_request_skips_api() {
        let api = Arc::new(Counter {
            calls: AtomicUsize::new(0),
        });
        let handler = balance_handler(Arc::clone(&api));
        let codec = MethodCodec::<GetBalance>::new();

        for garbage in [&b""[..], &b"\x01"[..], &[0xff; 64][..]] {
            let response = handler(CallContext::background(), Bytes::copy_from_slice(garbage))
                .await
                .unwrap();
            assert!(matches!(
                codec.unpack_response(&response).unwrap(),
                Err(ApiError::MalformedRequest(_))
            ));
        }
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_api() {
        let api = Arc::new(Counter {
            calls: AtomicUsize::new(0),
        });
        let handler = balance_handler(Arc::clone(&api));
        let codec = MethodCodec::<GetBalance>::new();

        let ctx = CallContext::background();
        ctx.cancel();
        let request = codec
            .pack_request((Address([3; 20]), BlockReference::Latest))
            .unwrap();
        let response = handler(ctx, request).await.unwrap();
        assert_eq!(
            codec.unpack_response(&response).unwrap(),
            Err(ApiError::Cancelled)
        );
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_args_method() {
        let handler = make_request_handler(
            Arc::new(()),
            MethodCodec::<GetNumShards>::new(),
            Arc::new(|_api: Arc<()>, _ctx: CallContext, (): ()| -> ApiFut<'static, u64> {
                Box::pin(async { Ok(4) })
            }),
        );
        let codec = MethodCodec::<GetNumShards>::new();
        let response = handler(CallContext::background(), codec.pack_request(()).unwrap())
            .await
            .unwrap();
        assert_eq!(codec.unpack_response(&response).unwrap(), Ok(4));
    }
}
