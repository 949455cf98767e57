use indicatif::ProgressBar;
use indicatif::{MultiProgress, ProgressStyle};
use ndarray::{s, Array2, ArrayView1};
use rayon::prelude::*;

pub trait MarkovChain {
    /// Does one iteration of the chain, returning the new trace row.
    fn step(&mut self) -> Vec<f64>;

    /// Number of values in each trace row.
    fn trace_width(&self) -> usize;
}

pub fn run_chain<M: MarkovChain>(chain: &mut M, n_steps: usize) -> Array2<f64> {
    let dim = chain.trace_width();
    let mut out = Array2::<f64>::zeros((n_steps, dim));

    for i in 0..n_steps {
        let row = chain.step();
        out.row_mut(i).assign(&ArrayView1::from(&row));
    }

    out
}

pub fn run_chain_with_progress<M: MarkovChain>(
    chain: &mut M,
    n_steps: usize,
    pb: &ProgressBar,
) -> Array2<f64> {
    let dim = chain.trace_width();
    let mut out = Array2::<f64>::zeros((n_steps, dim));

    pb.set_length(n_steps as u64);

    for i in 0..n_steps {
        let row = chain.step();
        out.row_mut(i).assign(&ArrayView1::from(&row));

        // Update progress bar
        pb.inc(1);
    }

    out
}

/// A trait for "anything that owns multiple MarkovChains".
pub trait HasChains {
    type Chain: MarkovChain + std::marker::Send;

    /// Returns a mutable reference to the vector of chains.
    fn chains_mut(&mut self) -> &mut Vec<Self::Chain>;
}

pub trait ChainRunner: HasChains {
    /// Runs the chains in parallel, discarding burn-in.
    fn run(&mut self, n_steps: usize, discard: usize) -> Vec<Array2<f64>> {
        // Run them all in parallel
        let results: Vec<Array2<f64>> = self
            .chains_mut()
            .par_iter_mut()
            .map(|chain| run_chain(chain, n_steps))
            .collect();

        // Now we can discard burn-in rows from each matrix
        results
            .into_iter()
            .map(|mat| discard_rows(mat, discard))
            .collect()
    }

    fn run_with_progress(&mut self, n_steps: usize, discard: usize) -> Vec<Array2<f64>> {
        let multi = MultiProgress::new();
        let pb_style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("##-");

        // Run each chain in parallel
        let results: Vec<Array2<f64>> = self
            .chains_mut()
            .par_iter_mut()
            .enumerate()
            .map(|(i, chain)| {
                // Create a progress bar for this chain
                let pb = multi.add(indicatif::ProgressBar::new(n_steps as u64));
                pb.set_prefix(format!("Chain {i}"));
                pb.set_style(pb_style.clone());

                let samples = run_chain_with_progress(chain, n_steps, &pb);

                pb.finish_with_message("Done!");
                samples
            })
            .collect();

        // Discard burn-in
        results
            .into_par_iter()
            .map(|samples| discard_rows(samples, discard))
            .collect()
    }
}

impl<T: HasChains> ChainRunner for T {}

fn discard_rows(samples: Array2<f64>, discard: usize) -> Array2<f64> {
    let discard = discard.min(samples.nrows());
    samples.slice(s![discard.., ..]).to_owned()
}
