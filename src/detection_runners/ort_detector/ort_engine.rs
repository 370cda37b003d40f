//! ONNX Runtime session wrapper: provider selection, tensor type alignment and
//! output extraction.

use anyhow::Result;
use half::{bf16, f16};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{ExecutionProvider,
                          CPUExecutionProvider,
                          CUDAExecutionProvider,
                          TensorRTExecutionProvider},
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::Session,
    tensor::TensorElementType,
    value::{DynValue, Tensor, ValueType},
};
use crate::common::InferenceDevice;
use crate::data::{ConfigOrt, FsAccess, TimeCalc, CROSS_MARK};
use crate::detection_runners::input_wrapper::X;

/// Names, element types and dimensions of a session's inputs or outputs.
/// Dynamic dimensions are reported as `-1`.
#[derive(Debug, Clone, Default)]
pub struct OrtTensorAttr {
    pub names: Vec<String>,
    pub dtypes: Vec<TensorElementType>,
    pub dimss: Vec<Vec<i64>>,
}

impl OrtTensorAttr {
    fn push(&mut self, name: &str, value_type: &ValueType) -> Result<()> {
        match value_type {
            ValueType::Tensor { ty, shape, .. } => {
                self.names.push(name.to_string());
                self.dtypes.push(*ty);
                self.dimss.push(shape.iter().copied().collect());
                Ok(())
            }
            other => anyhow::bail!("{CROSS_MARK} '{}' is not a tensor ({:?})", name, other),
        }
    }
}

#[derive(Debug)]
pub struct OrtEngine {
    session: Session,
    device: InferenceDevice,
    inputs_attrs: OrtTensorAttr,
    outputs_attrs: OrtTensorAttr,
    profile: bool,
    pub infer_time: TimeCalc,
}

impl OrtEngine {
    pub fn new(config: &ConfigOrt) -> Result<Self> {
        if let Some(lib) = &config.ort_lib_path {
            match ort::init_from(lib).commit() {
                Ok(_) => {},
                Err(e) => anyhow::bail!("{CROSS_MARK} Failed to load ONNX Runtime from {}: {:?}", lib, e),
            };
        }

        let mut builder = Session::builder()?;

        let mut device = config.device;
        match device {
            InferenceDevice::TensorRT(device_id) => {
                Self::build_trt(&mut builder, device_id, config.trt_fp16_enable, config.trt_engine_cache_enable)
                    .unwrap_or_else(|err| {
                        log::warn!("{err}, Using cpu");
                        device = InferenceDevice::CPU;
                    })
            }
            InferenceDevice::CUDA(device_id) => {
                Self::build_cuda(&mut builder, device_id).unwrap_or_else(|err| {
                    log::warn!("{err}, Using cpu");
                    device = InferenceDevice::CPU;
                })
            }
            InferenceDevice::CPU => {}
        }
        if device == InferenceDevice::CPU {
            Self::build_cpu(&mut builder)?;
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&config.onnx_path)?;

        let mut inputs_attrs = OrtTensorAttr::default();
        for input in session.inputs.iter() {
            inputs_attrs.push(&input.name, &input.input_type)?;
        }
        let mut outputs_attrs = OrtTensorAttr::default();
        for output in session.outputs.iter() {
            outputs_attrs.push(&output.name, &output.output_type)?;
        }
        if inputs_attrs.names.len() != 1 {
            anyhow::bail!("{CROSS_MARK} Expected a single image input, the model has {}", inputs_attrs.names.len());
        }
        log::debug!("Inputs: {:?}", inputs_attrs);
        log::debug!("Outputs: {:?}", outputs_attrs);

        log::info!(
            "Backend: ONNXRuntime | Device: {} | Input: {} {:?} {:?}",
            device,
            inputs_attrs.names[0],
            inputs_attrs.dtypes[0],
            inputs_attrs.dimss[0],
        );

        Ok(Self {
            session,
            device,
            inputs_attrs,
            outputs_attrs,
            profile: config.profile,
            infer_time: TimeCalc::default(),
        })
    }

    fn build_trt(
        builder: &mut SessionBuilder,
        device_id: usize,
        fp16_enable: bool,
        engine_cache_enable: bool,
    ) -> Result<()> {
        let cache_dir = FsAccess::Cache.path_with_subs(&["trt-cache"])?;
        let trt = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_fp16(fp16_enable)
            .with_engine_cache(engine_cache_enable)
            .with_engine_cache_path(cache_dir.to_string_lossy().to_string());
        if trt.is_available()? {
            match trt.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} TensorRT initialization failed: {:?}", err) }
            }
            log::info!("🐢 Initial model serialization with TensorRT may take some time...");
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} TensorRT execution provider not available")
        }
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> Result<()> {
        let ep = CUDAExecutionProvider::default()
            .with_device_id(device_id as i32);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CUDA initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CUDA execution provider not available")
        }
    }

    fn build_cpu(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CPUExecutionProvider::default();
        match ep.register(builder) {
            Ok(_) => Ok(()),
            Err(err) => anyhow::bail!("{CROSS_MARK} CPU initialization failed: {:?}", err),
        }
    }

    fn tensor_preprocess(x: &X, dtype: &TensorElementType) -> Result<DynValue> {
        let x = match dtype {
            TensorElementType::Float32 => Tensor::from_array(x.0.clone())?.into_dyn(),
            TensorElementType::Float16 => Tensor::from_array(x.mapv(f16::from_f32))?.into_dyn(),
            TensorElementType::Bfloat16 => Tensor::from_array(x.mapv(bf16::from_f32))?.into_dyn(),
            TensorElementType::Float64 => Tensor::from_array(x.mapv(|x_| x_ as f64))?.into_dyn(),
            TensorElementType::Uint8 => Tensor::from_array(x.mapv(|x_| (x_ * 255.) as u8))?.into_dyn(),
            _ => anyhow::bail!("Unsupported model input type: {:?}", dtype),
        };
        Ok(x)
    }

    fn tensor_postprocess(x: &DynValue, dtype: &TensorElementType) -> Result<Array<f32, IxDyn>> {
        fn extract<T>(x: &DynValue, map_fn: impl Fn(T) -> f32) -> Result<Array<f32, IxDyn>>
        where
            T: Clone + 'static + ort::tensor::PrimitiveTensorElementType,
        {
            Ok(x.try_extract_array::<T>()?.mapv(map_fn))
        }
        match dtype {
            TensorElementType::Float32 => extract::<f32>(x, |x| x),
            TensorElementType::Float16 => extract::<f16>(x, f16::to_f32),
            TensorElementType::Bfloat16 => extract::<bf16>(x, bf16::to_f32),
            TensorElementType::Float64 => extract::<f64>(x, |x| x as f32),
            TensorElementType::Int64 => extract::<i64>(x, |x| x as f32),
            TensorElementType::Int32 => extract::<i32>(x, |x| x as f32),
            _ => Err(anyhow::anyhow!("Unsupported ort tensor type: {:?}", dtype)),
        }
    }

    /// Runs the session on a single input tensor and returns every output as f32.
    pub fn run(&mut self, x: X) -> Result<Vec<X>> {
        let t_pre = std::time::Instant::now();
        let value = Self::tensor_preprocess(&x, &self.inputs_attrs.dtypes[0])?;
        let t_pre = t_pre.elapsed();
        self.infer_time.add_or_push(0, t_pre);

        let t_run = std::time::Instant::now();
        let outputs = self
            .session
            .run(ort::inputs![self.inputs_attrs.names[0].as_str() => value])?;
        let t_run = t_run.elapsed();
        self.infer_time.add_or_push(1, t_run);

        let t_post = std::time::Instant::now();
        let mut ys = Vec::with_capacity(self.outputs_attrs.names.len());
        for (dtype, name) in self.outputs_attrs.dtypes.iter().zip(self.outputs_attrs.names.iter()) {
            let y = Self::tensor_postprocess(&outputs[name.as_str()], dtype)?;
            ys.push(X::from(y));
        }
        let t_post = t_post.elapsed();
        self.infer_time.add_or_push(2, t_post);

        if self.profile {
            log::info!(
                "[Profile] {:.2?} ({:.2?} avg) [alignment: {:.2?} | inference: {:.2?} ({:.2?} avg) | to_f32: {:.2?}]",
                t_pre + t_run + t_post,
                self.infer_time.avg(),
                t_pre,
                t_run,
                self.infer_time.avg_i(1),
                t_post,
            );
        }
        Ok(ys)
    }

    /// Custom metadata entry stored in the ONNX file, e.g. `names`.
    pub fn try_fetch(&self, key: &str) -> Option<String> {
        match self.session.metadata() {
            Ok(metadata) => metadata.custom(key).ok().flatten(),
            Err(err) => {
                log::debug!("No model metadata: {:?}", err);
                None
            }
        }
    }

    /// Fixed `(height, width)` of the image input, `None` when either is dynamic.
    pub fn fixed_input_hw(&self) -> Option<(u32, u32)> {
        let dims = self.inputs_attrs.dimss.first()?;
        if dims.len() != 4 || dims[2] <= 0 || dims[3] <= 0 {
            return None;
        }
        Some((dims[2] as u32, dims[3] as u32))
    }

    /// Dimensions of the first output, `-1` where dynamic.
    pub fn output_dims(&self) -> Option<&[i64]> {
        self.outputs_attrs.dimss.first().map(|d| d.as_slice())
    }

    pub fn device(&self) -> InferenceDevice {
        self.device
    }
}
