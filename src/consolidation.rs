//! Consolidation plans: groups of fragments the engine would merge.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handle::{CapiHandle, ConsolidationPlanHandle};
use crate::sys;
use crate::util::cstr_to_string;

/// Decoded form of [`ConsolidationPlan::dump`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDump {
    pub nodes: Vec<PlanNode>,
}

/// One group of fragments to consolidate together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanNode {
    #[serde(rename = "uri")]
    pub uris: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConsolidationPlan {
    context: Context,
    handle: ConsolidationPlanHandle,
}

impl ConsolidationPlan {
    pub(crate) fn from_handle(context: &Context, handle: ConsolidationPlanHandle) -> Self {
        Self {
            context: context.clone(),
            handle,
        }
    }

    fn raw(&self) -> *mut sys::tiledb_consolidation_plan_t {
        self.handle.get().as_ptr()
    }

    pub fn num_nodes(&self) -> Result<u64> {
        let mut num = 0;
        self.context.capi_call(
            || "get consolidation plan node count".into(),
            |ctx| unsafe { sys::tiledb_consolidation_plan_get_num_nodes(ctx, self.raw(), &mut num) },
        )?;
        Ok(num)
    }

    pub fn num_fragments(&self, node: u64) -> Result<u64> {
        let mut num = 0;
        self.context.capi_call(
            || format!("get fragment count of consolidation node {node}"),
            |ctx| unsafe { sys::tiledb_consolidation_plan_get_num_fragments(ctx, self.raw(), node, &mut num) },
        )?;
        Ok(num)
    }

    pub fn fragment_uri(&self, node: u64, fragment: u64) -> Result<String> {
        let mut uri = std::ptr::null();
        self.context.capi_call(
            || format!("get uri of fragment {fragment} in consolidation node {node}"),
            |ctx| unsafe {
                sys::tiledb_consolidation_plan_get_fragment_uri(ctx, self.raw(), node, fragment, &mut uri)
            },
        )?;
        unsafe { cstr_to_string(uri, "uri") }
    }

    /// The engine's JSON description of the plan.
    pub fn dump(&self) -> Result<PlanDump> {
        let mut json = std::ptr::null_mut();
        self.context.capi_call(
            || "dump consolidation plan".into(),
            |ctx| unsafe { sys::tiledb_consolidation_plan_dump_json_str(ctx, self.raw(), &mut json) },
        )?;
        let text = unsafe { cstr_to_string(json, "json") };
        if unsafe { sys::tiledb_consolidation_plan_free_json_str(&mut json) } != sys::TILEDB_OK {
            tracing::warn!("failed to free consolidation plan dump");
        }
        serde_json::from_str(&text?).map_err(Error::from)
    }

    pub fn free(&self) {
        self.handle.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_decodes_nodes() {
        let dump: PlanDump =
            serde_json::from_str(r#"{"nodes":[{"uri":["a","b"]},{"uri":["c","d","e"]}]}"#).unwrap();
        assert_eq!(dump.nodes.len(), 2);
        assert_eq!(dump.nodes[1].uris, vec!["c", "d", "e"]);
    }

    #[test]
    fn test_malformed_dump_is_json_error() {
        let err = serde_json::from_str::<PlanDump>(r#"{"nodes":[{"uri":"a"}]}"#)
            .map_err(Error::from)
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
