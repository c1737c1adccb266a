//! Random Forest для регрессии (CART, squared error, bootstrap)

#![allow(non_snake_case)]

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};

/// Сколько признаков рассматривать в каждом разбиении
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Fraction(f64),
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
        };
        n.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    #[serde(default = "default_max_features")]
    pub max_features: MaxFeatures,
    #[serde(default = "default_bootstrap")]
    pub bootstrap: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_n_estimators() -> usize { 100 }
fn default_min_samples_split() -> usize { 2 }
fn default_min_samples_leaf() -> usize { 1 }
fn default_max_features() -> MaxFeatures { MaxFeatures::All }
fn default_bootstrap() -> bool { true }
fn default_seed() -> u64 { 42 }

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            max_features: default_max_features(),
            bootstrap: default_bootstrap(),
            seed: default_seed(),
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(TrafficError::ConfigError("n_estimators must be at least 1".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(TrafficError::ConfigError("min_samples_split must be at least 2".to_string()));
        }
        if self.min_samples_leaf < 1 {
            return Err(TrafficError::ConfigError("min_samples_leaf must be at least 1".to_string()));
        }
        if let Some(0) = self.max_depth {
            return Err(TrafficError::ConfigError("max_depth must be at least 1".to_string()));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(TrafficError::ConfigError(format!(
                    "max_features fraction must be in (0, 1], got {}",
                    f
                )));
            }
        }
        Ok(())
    }
}

/// Узел дерева. Дерево хранится плоским массивом, дети - индексы в нем.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Сумма квадратов отклонений в двух детях
    sse: f64,
}

/// Сумма квадратов отклонений от среднего по накопленным суммам
fn sse(count: usize, sum: f64, sq_sum: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (sq_sum - sum * sum / count as f64).max(0.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct TreeBuilder<'a> {
    X: &'a Array2<f64>,
    y: &'a Array1<f64>,
    params: &'a ForestParams,
    n_split_features: usize,
    rng: StdRng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let n = indices.len();
        let (sum, sq_sum) = indices.iter().fold((0.0, 0.0), |(s, sq), &i| {
            let v = self.y[i];
            (s + v, sq + v * v)
        });
        let mean = sum / n as f64;
        let node_sse = sse(n, sum, sq_sum);

        let should_stop = n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || self.params.max_depth.map_or(false, |d| depth >= d)
            || node_sse <= 1e-12 * n as f64;

        if should_stop {
            return self.push(Node::Leaf { value: mean });
        }

        let best = match self.find_best_split(indices, sum, sq_sum) {
            Some(candidate) if candidate.sse < node_sse => candidate,
            _ => return self.push(Node::Leaf { value: mean }),
        };

        self.importances[best.feature] += node_sse - best.sse;

        // Разбиение индексов на месте: слева x <= threshold
        let mut boundary = 0;
        for k in 0..n {
            if self.X[[indices[k], best.feature]] <= best.threshold {
                indices.swap(k, boundary);
                boundary += 1;
            }
        }

        let node_idx = self.push(Node::Leaf { value: mean });
        let (left_indices, right_indices) = indices.split_at_mut(boundary);
        let left = self.build(left_indices, depth + 1);
        let right = self.build(right_indices, depth + 1);

        self.nodes[node_idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node_idx
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn find_best_split(&mut self, indices: &[usize], total_sum: f64, total_sq: f64) -> Option<SplitCandidate> {
        let n_features = self.X.ncols();
        let features: Vec<usize> = if self.n_split_features >= n_features {
            (0..n_features).collect()
        } else {
            sample(&mut self.rng, n_features, self.n_split_features).into_vec()
        };

        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;
        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<usize> = indices.to_vec();

        for feature in features {
            let X = self.X;
            order.sort_by(|&a, &b| X[[a, feature]].total_cmp(&X[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for pos in 0..n - 1 {
                let v = self.y[order[pos]];
                left_sum += v;
                left_sq += v * v;

                let current = X[[order[pos], feature]];
                let next = X[[order[pos + 1], feature]];
                if current == next {
                    continue;
                }

                let left_count = pos + 1;
                let right_count = n - left_count;
                if left_count < min_leaf || right_count < min_leaf {
                    continue;
                }

                let split_sse = sse(left_count, left_sum, left_sq)
                    + sse(right_count, total_sum - left_sum, total_sq - left_sq);

                if best.as_ref().map_or(true, |b| split_sse < b.sse) {
                    let mut threshold = current + (next - current) / 2.0;
                    // Середина может совпасть с next из-за округления
                    if threshold >= next {
                        threshold = current;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        sse: split_sse,
                    });
                }
            }
        }

        best
    }
}

impl RegressionTree {
    fn fit(
        X: &Array2<f64>,
        y: &Array1<f64>,
        mut indices: Vec<usize>,
        params: &ForestParams,
        seed: u64,
    ) -> (Self, Vec<f64>) {
        let mut builder = TreeBuilder {
            X,
            y,
            params,
            n_split_features: params.max_features.resolve(X.ncols()),
            rng: StdRng::seed_from_u64(seed),
            nodes: Vec::new(),
            importances: vec![0.0; X.ncols()],
        };
        builder.build(&mut indices, 0);

        (
            Self {
                nodes: builder.nodes,
            },
            builder.importances,
        )
    }

    pub fn predict_one(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn node_depth(nodes: &[Node], idx: usize) -> usize {
            match nodes[idx] {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => {
                    1 + node_depth(nodes, left).max(node_depth(nodes, right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            node_depth(&self.nodes, 0)
        }
    }

    /// Родитель всегда записан раньше детей, поэтому ссылки только вперед.
    /// Это же исключает циклы при обходе.
    fn is_well_formed(&self, n_features: usize) -> bool {
        let n_nodes = self.nodes.len();
        n_nodes > 0
            && self.nodes.iter().enumerate().all(|(idx, node)| match *node {
                Node::Leaf { value } => value.is_finite(),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    feature < n_features
                        && !threshold.is_nan()
                        && left > idx
                        && right > idx
                        && left < n_nodes
                        && right < n_nodes
                }
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForestRegressor {
    pub fn fit(params: ForestParams, X: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        params.validate()?;

        let n_samples = X.nrows();
        let n_features = X.ncols();
        if n_samples == 0 || n_features == 0 {
            return Err(TrafficError::DataError("Empty dataset".to_string()));
        }
        if n_samples != y.len() {
            return Err(TrafficError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut total_importances = vec![0.0; n_features];

        for tree_idx in 0..params.n_estimators {
            let tree_seed: u64 = rng.gen();
            let indices: Vec<usize> = if params.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let (tree, importances) = RegressionTree::fit(X, y, indices, &params, tree_seed);
            tracing::trace!(
                "Tree {} built: {} nodes, depth {}",
                tree_idx,
                tree.n_nodes(),
                tree.depth()
            );

            // Нормализуем важности по дереву, потом усредняем
            let tree_total: f64 = importances.iter().sum();
            if tree_total > 0.0 {
                for (acc, imp) in total_importances.iter_mut().zip(importances.iter()) {
                    *acc += imp / tree_total;
                }
            }
            trees.push(tree);

            if (tree_idx + 1) % 25 == 0 {
                tracing::debug!("Random forest: {}/{} trees", tree_idx + 1, params.n_estimators);
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        Ok(Self {
            params,
            n_features,
            trees,
            feature_importances: total_importances,
        })
    }

    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if X.ncols() != self.n_features {
            return Err(TrafficError::ShapeError {
                expected: format!("{} columns", self.n_features),
                actual: format!("{} columns", X.ncols()),
            });
        }

        let mut predictions = Array1::zeros(X.nrows());
        for (i, row) in X.rows().into_iter().enumerate() {
            let sample = row.to_vec();
            predictions[i] = self.predict_sample(&sample)?;
        }
        Ok(predictions)
    }

    pub fn predict_one(&self, sample: &[f64]) -> Result<f64> {
        if sample.len() != self.n_features {
            return Err(TrafficError::ShapeError {
                expected: format!("{} columns", self.n_features),
                actual: format!("{} columns", sample.len()),
            });
        }
        self.predict_sample(sample)
    }

    fn predict_sample(&self, sample: &[f64]) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(TrafficError::ModelNotFitted);
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict_one(sample)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    /// Проверка структуры после загрузки с диска
    pub fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(TrafficError::ModelNotFitted);
        }
        if self.feature_importances.len() != self.n_features {
            return Err(TrafficError::ShapeError {
                expected: format!("{} feature importances", self.n_features),
                actual: format!("{}", self.feature_importances.len()),
            });
        }
        if let Some(idx) = self
            .trees
            .iter()
            .position(|tree| !tree.is_well_formed(self.n_features))
        {
            return Err(TrafficError::DataError(format!("Tree {} is malformed", idx)));
        }
        Ok(())
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}
