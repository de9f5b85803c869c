use std::collections::HashMap;
use std::sync::Mutex;

use crate::campaign::{Campaign, CampaignError};
use crate::ident::RunId;
use crate::params::{ParamAssignment, ParamSpace, RNG_RUN};
use crate::run::{RunMeta, RunResult};
use crate::trace::PACKETS_TRACE;

/// Renders `(src, tx_ns, rx_ns, size)` tuples as a packet trace.
pub(crate) fn packets_csv(packets: &[(usize, u64, u64, u64)]) -> String {
    let mut csv = String::from("SrcNodeId,TxTimestamp_ns,RxTimestamp_ns,PktSize_B\n");
    for (src, tx, rx, size) in packets {
        csv.push_str(&format!("{src},{tx},{rx},{size}\n"));
    }
    csv
}

pub(crate) fn run_with_packets(params: ParamAssignment, csv: &str) -> RunResult {
    let meta = RunMeta {
        id: RunId::new("test-run"),
        repetition: 0,
    };
    RunResult::new(meta, params, Default::default()).with_artifact(PACKETS_TRACE, csv)
}

/// A campaign that "simulates" by calling a generator on the parameters of each run, including
/// its `RngRun`.
pub(crate) struct MemoryCampaign<F> {
    generator: F,
    results: Mutex<HashMap<(ParamAssignment, usize), RunResult>>,
}

impl<F> MemoryCampaign<F>
where
    F: Fn(&ParamAssignment) -> Vec<(String, String)> + Sync,
{
    pub(crate) fn new(generator: F) -> Self {
        Self {
            generator,
            results: Mutex::new(HashMap::new()),
        }
    }
}

impl<F> Campaign for MemoryCampaign<F>
where
    F: Fn(&ParamAssignment) -> Vec<(String, String)> + Sync,
{
    fn run_missing_simulations(
        &self,
        space: &ParamSpace,
        runs: usize,
    ) -> Result<(), CampaignError> {
        let mut results = self.results.lock().unwrap();
        for params in space.assignments() {
            for rep in 0..runs {
                let key = (params.clone(), rep);
                let nr_results = results.len();
                results.entry(key).or_insert_with(|| {
                    let params = params.clone().with(RNG_RUN, rep);
                    let meta = RunMeta {
                        id: RunId::new(format!("run-{nr_results}")),
                        repetition: rep,
                    };
                    let output = (self.generator)(&params).into_iter().collect();
                    RunResult::new(meta, params, output)
                });
            }
        }
        Ok(())
    }

    fn get_results(
        &self,
        params: &ParamAssignment,
        runs: usize,
    ) -> Result<Vec<RunResult>, CampaignError> {
        let results = self.results.lock().unwrap();
        Ok((0..runs)
            .map_while(|rep| results.get(&(params.clone(), rep)).cloned())
            .collect())
    }
}

impl<F> std::fmt::Debug for MemoryCampaign<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCampaign").finish_non_exhaustive()
    }
}
