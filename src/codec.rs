//! Per-method codecs and the codec table.
//!
//! [`match_methods`] pairs the API surface with the protocol mirror by method
//! name. [`MethodCodec`] is the derived decode/encode pair for one method, and
//! [`CodecTable`] holds one [`CodecEntry`] per method of the selected surface,
//! each able to bind a live API value into a [`RequestHandler`].

use crate::api::{api_surface, ApiError, ApiFut, ApiMethod, ApiResult, Capability};
use crate::context::CallContext;
use crate::error::{Result, ShardwireError};
use crate::handler::{make_request_handler, RequestHandler};
use crate::protocol::{self, pb, DecodeError, MethodDescriptor, RpcMethod};
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Decode/encode pair for the method mirrored by `M`.
pub struct MethodCodec<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M> Clone for MethodCodec<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for MethodCodec<M> {}

impl<M: RpcMethod> Default for MethodCodec<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RpcMethod> fmt::Debug for MethodCodec<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MethodCodec").field(&M::NAME).finish()
    }
}

impl<M: RpcMethod> MethodCodec<M> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        M::NAME
    }

    /// Decode request bytes into the method's native arguments.
    ///
    /// Only a complete encoding of the request shape is accepted; trailing
    /// bytes are malformed.
    pub fn unpack_request(&self, request: &[u8]) -> std::result::Result<M::Args, DecodeError> {
        let shape: M::Request = protocol::decode(request)?;
        shape.try_into()
    }

    /// Encode a call result, success or failure, as a response payload.
    pub fn pack_response(&self, result: ApiResult<M::Output>) -> Result<Bytes> {
        let envelope = match result {
            Ok(output) => pb::Response::Data(M::Response::from(output)),
            Err(err) => pb::Response::Error(pb::Error::from(&err)),
        };
        protocol::serialize(&envelope)
    }

    /// Encode a failure as a response payload.
    ///
    /// The error envelope is a code and a string, which always serialize.
    /// Were that ever to fail, the failure is logged and the payload is empty.
    pub fn pack_error(&self, err: &ApiError) -> Bytes {
        let envelope: pb::Response<M::Response> = pb::Response::Error(err.into());
        match protocol::serialize(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to encode {} error envelope: {}", M::NAME, e);
                Bytes::new()
            }
        }
    }

    /// Encode native arguments as request bytes (calling side).
    pub fn pack_request(&self, args: M::Args) -> Result<Bytes> {
        protocol::serialize(&M::Request::from(args))
    }

    /// Decode a response payload into the call result (calling side).
    pub fn unpack_response(
        &self,
        response: &[u8],
    ) -> std::result::Result<ApiResult<M::Output>, DecodeError> {
        let envelope: pb::Response<M::Response> = protocol::decode(response)?;
        match envelope {
            pb::Response::Data(shape) => Ok(Ok(shape.try_into()?)),
            pb::Response::Error(err) => Ok(Err(err.into())),
        }
    }
}

/// Match every method of `surface` exposed under `capability` with the
/// identically named mirror method.
pub fn match_methods(
    capability: Capability,
    surface: &'static [ApiMethod],
    mirror: &[MethodDescriptor],
) -> Result<Vec<MethodDescriptor>> {
    let mut by_name = HashMap::with_capacity(mirror.len());
    for descriptor in mirror {
        if by_name.insert(descriptor.name, descriptor).is_some() {
            return Err(ShardwireError::DuplicateMethod(descriptor.name.to_string()));
        }
    }

    let mut seen = HashSet::new();
    let mut matched = Vec::new();
    for method in api_surface(surface, capability) {
        if !seen.insert(method.name) {
            return Err(ShardwireError::DuplicateMethod(method.name.to_string()));
        }
        let descriptor = by_name
            .get(method.name)
            .ok_or_else(|| ShardwireError::MissingMirror(method.name.to_string()))?;
        if descriptor.capability != method.capability {
            return Err(ShardwireError::CapabilityConflict {
                method: method.name.to_string(),
                api: method.capability,
                mirror: descriptor.capability,
            });
        }
        matched.push(**descriptor);
    }
    Ok(matched)
}

type Binder<A> = Box<dyn Fn(Arc<A>) -> RequestHandler + Send + Sync>;

/// Codec of one method, ready to be bound to a live API value.
pub struct CodecEntry<A: ?Sized> {
    descriptor: MethodDescriptor,
    bind: Binder<A>,
}

impl<A: ?Sized> CodecEntry<A> {
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Produce the request handler serving this method on `api`.
    pub fn bind(&self, api: Arc<A>) -> RequestHandler {
        (self.bind)(api)
    }
}

impl<A: ?Sized> fmt::Debug for CodecEntry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecEntry")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Method name → codec for one (API type, capability) pair. Immutable once built.
pub struct CodecTable<A: ?Sized> {
    capability: Capability,
    entries: BTreeMap<&'static str, CodecEntry<A>>,
}

impl<A: ?Sized + Send + Sync + 'static> CodecTable<A> {
    pub fn builder(capability: Capability) -> CodecTableBuilder<A> {
        CodecTableBuilder {
            capability,
            entries: Vec::new(),
        }
    }
}

impl<A: ?Sized> CodecTable<A> {
    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn get(&self, name: &str) -> Option<&CodecEntry<A>> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in method-name order.
    pub fn iter(&self) -> impl Iterator<Item = &CodecEntry<A>> {
        self.entries.values()
    }
}

impl<A: ?Sized> fmt::Debug for CodecTable<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecTable")
            .field("capability", &self.capability)
            .field("methods", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects typed method bindings for a [`CodecTable`].
pub struct CodecTableBuilder<A: ?Sized> {
    capability: Capability,
    entries: Vec<CodecEntry<A>>,
}

impl<A: ?Sized + Send + Sync + 'static> CodecTableBuilder<A> {
    /// Bind method `M` to `invoke`, which calls the API with the decoded
    /// arguments. Methods not exposed under the builder's capability are
    /// skipped.
    pub fn method<M, F>(mut self, invoke: F) -> Self
    where
        M: RpcMethod,
        F: Fn(Arc<A>, CallContext, M::Args) -> ApiFut<'static, M::Output> + Send + Sync + 'static,
    {
        if !self.capability.includes(M::CAPABILITY) {
            tracing::trace!("Skipping {} under {} capability", M::NAME, self.capability);
            return self;
        }
        let invoke = Arc::new(invoke);
        let bind: Binder<A> = Box::new(move |api| {
            make_request_handler(api, MethodCodec::<M>::new(), Arc::clone(&invoke))
        });
        self.entries.push(CodecEntry {
            descriptor: MethodDescriptor::of::<M>(),
            bind,
        });
        self
    }

    /// Build the table, checking it covers exactly the `matched` methods.
    pub fn build(self, matched: &[MethodDescriptor]) -> Result<CodecTable<A>> {
        let mut entries = BTreeMap::new();
        for entry in self.entries {
            let name = entry.descriptor.name;
            let Some(expected) = matched.iter().find(|d| d.name == name) else {
                return Err(ShardwireError::UnexpectedMethod(name.to_string()));
            };
            if *expected != entry.descriptor {
                return Err(ShardwireError::CodecMismatch(name.to_string()));
            }
            if entries.insert(name, entry).is_some() {
                return Err(ShardwireError::DuplicateMethod(name.to_string()));
            }
        }

        if let Some(missing) = matched.iter().find(|d| !entries.contains_key(d.name)) {
            return Err(ShardwireError::MissingCodec(missing.name.to_string()));
        }

        Ok(CodecTable {
            capability: self.capability,
            entries,
        })
    }
}
