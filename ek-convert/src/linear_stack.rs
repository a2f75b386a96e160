use std::collections::BTreeMap;

use byteorder::{ByteOrder, LittleEndian};
use ek_graph::onnx::GraphBuilder;
use ek_graph::shape::{Shape, Size};
use itertools::Itertools;
use safetensors::{Dtype, SafeTensors};
use tracing::{debug, info};

use crate::error::{ConvertError, ConvertResult};
use crate::options::ConvertOptions;

/// Activation inserted for parameterless modules between linear layers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
    None,
}

impl Activation {
    pub fn parse(s: &str) -> Option<Activation> {
        match s.to_ascii_lowercase().as_str() {
            "relu" => Some(Activation::Relu),
            "sigmoid" => Some(Activation::Sigmoid),
            "tanh" => Some(Activation::Tanh),
            "none" | "identity" => Some(Activation::None),
            _ => None,
        }
    }

    fn op_type(self) -> Option<&'static str> {
        match self {
            Activation::Relu => Some("Relu"),
            Activation::Sigmoid => Some("Sigmoid"),
            Activation::Tanh => Some("Tanh"),
            Activation::None => None,
        }
    }
}

#[derive(Debug)]
struct Param {
    name: String,
    shape: Vec<usize>,
    data: Vec<f32>,
}

#[derive(Debug, Default)]
struct Layer {
    weight: Option<Param>,
    bias: Option<Param>,
}

/// A sequential stack of linear layers, as stored in the state dict of a `torch.nn.Sequential`.
#[derive(Debug)]
pub struct LinearStack {
    layers: Vec<(usize, Param, Option<Param>)>,
}

impl LinearStack {
    /// Parse the parameters of a safetensors file.
    ///
    /// Tensors must be named `<prefix><index>.weight` or `<prefix><index>.bias`,
    /// with the same prefix for all of them.
    pub fn from_safetensors(bytes: &[u8]) -> ConvertResult<LinearStack> {
        let tensors = SafeTensors::deserialize(bytes)
            .map_err(|e| ConvertError::failure(format!("not a valid safetensors file: {}", e)))?;

        let mut prefix: Option<String> = None;
        let mut layers: BTreeMap<usize, Layer> = BTreeMap::new();

        for (name, view) in tensors.tensors() {
            // a bare `torch.nn.Linear` has no module index
            let (module, kind) = name.rsplit_once('.').unwrap_or(("0", name.as_str()));
            let (module_prefix, index) = match module.rsplit_once('.') {
                Some((p, i)) => (format!("{}.", p), i),
                None => (String::new(), module),
            };
            let index: usize = index
                .parse()
                .map_err(|_| ConvertError::failure(format!("parameter '{}' is not part of a sequential stack", name)))?;

            if let Some(expected) = &prefix {
                if *expected != module_prefix {
                    return Err(ConvertError::failure(format!(
                        "parameter '{}' does not share the prefix '{}'",
                        name, expected
                    )));
                }
            } else {
                prefix = Some(module_prefix);
            }

            if view.dtype() != Dtype::F32 {
                return Err(ConvertError::failure(format!(
                    "parameter '{}' has type {:?}, only F32 is supported",
                    name,
                    view.dtype()
                )));
            }

            let shape = view.shape().to_vec();
            let mut data = vec![0.0; shape.iter().product()];
            if view.data().len() != data.len() * 4 {
                return Err(ConvertError::failure(format!("parameter '{}' has the wrong data length", name)));
            }
            LittleEndian::read_f32_into(view.data(), &mut data);

            let param = Param {
                name: name.clone(),
                shape,
                data,
            };
            let layer = layers.entry(index).or_default();
            let slot = match kind {
                "weight" => &mut layer.weight,
                "bias" => &mut layer.bias,
                _ => return Err(ConvertError::failure(format!("unexpected parameter '{}'", name))),
            };
            if let Some(prev) = slot.replace(param) {
                return Err(ConvertError::failure(format!(
                    "parameters '{}' and '{}' map to the same module",
                    prev.name, name
                )));
            }
        }

        let layers = layers
            .into_iter()
            .map(|(index, layer)| {
                let weight = layer
                    .weight
                    .ok_or_else(|| ConvertError::failure(format!("module {} has a bias but no weight", index)))?;
                Ok((index, weight, layer.bias))
            })
            .collect::<ConvertResult<Vec<_>>>()?;

        if layers.is_empty() {
            return Err(ConvertError::failure("the checkpoint does not contain any parameters"));
        }

        let stack = LinearStack { layers };
        stack.check_shapes()?;
        Ok(stack)
    }

    fn check_shapes(&self) -> ConvertResult<()> {
        let mut prev_out: Option<usize> = None;

        for (index, weight, bias) in &self.layers {
            let &[fan_out, fan_in] = weight.shape.as_slice() else {
                return Err(ConvertError::failure(format!(
                    "weight '{}' must have rank 2, got shape {:?}",
                    weight.name, weight.shape
                )));
            };

            if let Some(bias) = bias {
                if bias.shape != [fan_out] {
                    return Err(ConvertError::failure(format!(
                        "bias '{}' has shape {:?}, expected [{}]",
                        bias.name, bias.shape, fan_out
                    )));
                }
            }

            if let Some(prev_out) = prev_out {
                if prev_out != fan_in {
                    return Err(ConvertError::failure(format!(
                        "module {} expects {} input features, but the previous layer produces {}",
                        index, fan_in, prev_out
                    )));
                }
            }
            prev_out = Some(fan_out);
        }

        Ok(())
    }

    pub fn in_features(&self) -> usize {
        self.layers[0].1.shape[1]
    }

    pub fn out_features(&self) -> usize {
        self.layers[self.layers.len() - 1].1.shape[0]
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Build the ONNX graph for this stack.
    pub fn to_onnx(&self, name: &str, options: &ConvertOptions) -> ConvertResult<GraphBuilder> {
        let activation = match options.extra.get("activation") {
            None => Activation::Relu,
            Some(value) => Activation::parse(value)
                .ok_or_else(|| ConvertError::InvalidOptions(format!("unknown activation '{}'", value)))?,
        };

        if options.input_names.len() > 1 || options.output_names.len() > 1 {
            return Err(ConvertError::InvalidOptions(
                "a linear stack has exactly one input and one output".to_owned(),
            ));
        }

        let in_features = self.in_features();
        let input_shape = match &options.input_shape {
            None => vec![1, in_features],
            Some(shape) => {
                // Gemm only takes matrices
                if shape.len() != 2 {
                    return Err(ConvertError::failure(format!(
                        "input shape {:?} has rank {}, a linear stack needs rank 2 [batch, {}]",
                        shape,
                        shape.len(),
                        in_features
                    )));
                }
                if shape[1] != in_features {
                    return Err(ConvertError::failure(format!(
                        "input shape {:?} does not match the first layer, expected [batch, {}]",
                        shape, in_features
                    )));
                }
                shape.clone()
            }
        };
        let output_shape = vec![input_shape[0], self.out_features()];

        let dynamic_axes = options.dynamic_axes();
        let declared = |dims: &[usize]| {
            Shape::new(
                dims.iter()
                    .enumerate()
                    .map(|(axis, &size)| {
                        if dynamic_axes.contains(&axis) {
                            Size::dynamic(ConvertOptions::axis_name(axis))
                        } else {
                            Size::fixed(size)
                        }
                    })
                    .collect_vec(),
            )
        };

        let input_name = options.input_name();
        let output_name = options.output_name();

        let mut builder = GraphBuilder::new(name, options.opset);
        builder.producer("edgekit", env!("CARGO_PKG_VERSION"));
        builder.input(input_name, declared(&input_shape));

        let mut prev = input_name.to_owned();
        let last = self.layers.len() - 1;

        for (i, (index, weight, bias)) in self.layers.iter().enumerate() {
            // a gap in the indices means there was a parameterless module in between
            if i > 0 {
                let prev_index = self.layers[i - 1].0;
                if index - prev_index > 1 {
                    if let Some(op_type) = activation.op_type() {
                        let activated = format!("/{}/{}_output_0", prev_index + 1, op_type);
                        builder.node(op_type, &[prev.as_str()], &[activated.as_str()]);
                        prev = activated;
                    }
                }
            }

            builder.initializer(&weight.name, &weight.shape, &weight.data);
            let mut inputs = vec![prev.as_str(), weight.name.as_str()];
            if let Some(bias) = bias {
                builder.initializer(&bias.name, &bias.shape, &bias.data);
                inputs.push(bias.name.as_str());
            }

            let output = if i == last {
                output_name.to_owned()
            } else {
                format!("/{}/Gemm_output_0", index)
            };
            builder
                .node("Gemm", &inputs, &[output.as_str()])
                .float("alpha", 1.0)
                .float("beta", 1.0)
                .int("transB", 1);
            prev = output;
        }

        builder.output(output_name, declared(&output_shape));

        debug!(
            "Built linear stack with {} layers, {} -> {} features",
            self.layers.len(),
            in_features,
            self.out_features()
        );
        info!("Exporting with example input shape {:?}", input_shape);

        Ok(builder)
    }
}
