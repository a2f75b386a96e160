use ek_graph::dtype::Tensor;
use ek_graph::graph::TensorSpec;
use ek_graph::shape::Shape;
use ndarray::IxDyn;
use rand::Rng;
use rand_distr::StandardNormal;

/// Size used for dynamic dimensions when generating synthetic inputs.
pub const DYNAMIC_DIM_SIZE: usize = 1;

/// The concrete shape to feed into `spec`, or an error message if there is none.
pub fn concrete_shape(spec: &TensorSpec) -> Result<Vec<usize>, String> {
    match &spec.shape {
        Some(shape) => Ok(shape.concretize(DYNAMIC_DIM_SIZE)),
        None => Err(format!("input '{}' has no declared shape", spec.name)),
    }
}

/// Check a caller-provided shape against the declared one.
pub fn check_shape(spec: &TensorSpec, dims: &[usize]) -> Result<(), String> {
    match &spec.shape {
        Some(shape) if !shape.accepts(dims) => Err(format!(
            "shape {:?} does not match input '{}' declared as {}",
            dims, spec.name, shape
        )),
        _ => Ok(()),
    }
}

pub fn random_normal(rng: &mut impl Rng, dims: &[usize]) -> Tensor {
    Tensor::from_shape_fn(IxDyn(dims), |_| rng.sample::<f32, _>(StandardNormal))
}

/// One standard-normal tensor per input spec, with dynamic dimensions set to [DYNAMIC_DIM_SIZE].
pub fn random_inputs(rng: &mut impl Rng, specs: &[TensorSpec]) -> Result<Vec<Tensor>, String> {
    specs
        .iter()
        .map(|spec| concrete_shape(spec).map(|dims| random_normal(rng, &dims)))
        .collect()
}

pub fn format_dims(dims: &[usize]) -> String {
    Shape::fixed(dims).to_string()
}
