use super::config::Nonlinearity;
use candle_core::{D, DType, Device, Module, Result, Tensor};
use candle_nn::{Dropout, Linear, VarBuilder, linear};

/// Feed-forward stack where every step is nonlinearity, dropout, then a linear map.
///
/// Always has at least two linear maps: `input -> hidden`, any number of
/// `hidden -> hidden`, then `hidden -> output`. Parameters live under `{i}.weight` and
/// `{i}.bias`.
#[derive(Debug, Clone)]
pub struct Mlp {
    linears: Vec<Linear>,
    dropout: Dropout,
    nonlinearity: Nonlinearity,
}

impl Mlp {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        output_size: usize,
        n_layers: usize,
        dropout: f64,
        nonlinearity: Nonlinearity,
        vb: VarBuilder,
    ) -> Result<Self> {
        let n_layers = n_layers.max(2);
        let mut linears = Vec::with_capacity(n_layers);
        linears.push(linear(input_size, hidden_size, vb.pp(0))?);
        for i in 1..n_layers - 1 {
            linears.push(linear(hidden_size, hidden_size, vb.pp(i))?);
        }
        linears.push(linear(hidden_size, output_size, vb.pp(n_layers - 1))?);
        Ok(Self {
            linears,
            dropout: Dropout::new(dropout as f32),
            nonlinearity,
        })
    }

    pub fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut hs = xs.clone();
        for layer in &self.linears {
            hs = self.nonlinearity.apply(&hs)?;
            hs = self.dropout.forward(&hs, train)?;
            hs = layer.forward(&hs)?;
        }
        Ok(hs)
    }
}

/// Expands per-group counts into the group id of every element: `[3, 2]` gives
/// `[0, 0, 0, 1, 1]`. Zero-length groups contribute no elements.
pub fn lengths_to_ids(lengths: &[usize]) -> Vec<u32> {
    lengths
        .iter()
        .enumerate()
        .flat_map(|(group, &len)| std::iter::repeat_n(group as u32, len))
        .collect()
}

pub(crate) fn index_tensor(ids: &[u32], device: &Device) -> Result<Tensor> {
    Tensor::from_slice(ids, ids.len(), device)
}

/// Sums rows of `src` into `dim_size` buckets along dimension 0.
pub(crate) fn scatter_sum(src: &Tensor, index: &[u32], dim_size: usize) -> Result<Tensor> {
    let mut dims = src.dims().to_vec();
    dims[0] = dim_size;
    let zeros = Tensor::zeros(dims, src.dtype(), src.device())?;
    if index.is_empty() {
        return Ok(zeros);
    }
    zeros.index_add(&index_tensor(index, src.device())?, src, 0)
}

/// Packs the rows of `src` into a zero-padded `[n_groups, max_len, dim]` tensor.
///
/// Returns the padded tensor and a `[n_groups, max_len]` mask holding 1 for real rows.
/// `group_ids` gives the group of every row; rows keep their relative order.
pub(crate) fn batchify(
    src: &Tensor,
    group_ids: &[u32],
    n_groups: usize,
) -> Result<(Tensor, Tensor)> {
    let device = src.device();
    let dim = src.dim(D::Minus1)?;
    let mut fill = vec![0usize; n_groups];
    let mut positions = Vec::with_capacity(group_ids.len());
    for &group in group_ids {
        positions.push(fill[group as usize]);
        fill[group as usize] += 1;
    }
    let max_len = fill.iter().copied().max().unwrap_or(0).max(1);

    let mut mask = vec![0f32; n_groups * max_len];
    let flat: Vec<u32> = group_ids
        .iter()
        .zip(&positions)
        .map(|(&group, &pos)| {
            let slot = group as usize * max_len + pos;
            mask[slot] = 1.0;
            slot as u32
        })
        .collect();

    let padded = scatter_sum(src, &flat, n_groups * max_len)?.reshape((n_groups, max_len, dim))?;
    let mask = Tensor::from_vec(mask, (n_groups, max_len), device)?.to_dtype(src.dtype())?;
    Ok((padded, mask))
}

/// Writes row blocks back to their original positions in an `n_rows`-row tensor.
pub(crate) fn reassemble(
    parts: &[(&[u32], Tensor)],
    n_rows: usize,
    width: usize,
    device: &Device,
) -> Result<Tensor> {
    let mut out = Tensor::zeros((n_rows, width), DType::F32, device)?;
    for (rows, values) in parts {
        if rows.is_empty() {
            continue;
        }
        out = out.index_add(&index_tensor(rows, device)?, values, 0)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    #[test]
    fn lengths_expand_to_group_ids() {
        assert_eq!(lengths_to_ids(&[3, 2]), vec![0, 0, 0, 1, 1]);
        assert_eq!(lengths_to_ids(&[1, 0, 2]), vec![0, 2, 2]);
        assert!(lengths_to_ids(&[]).is_empty());
    }

    #[test]
    fn mlp_maps_input_to_output_width() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = Mlp::new(6, 8, 1, 3, 0.0, Nonlinearity::Gelu, vb.pp("head")).unwrap();

        let xs = Tensor::ones((4, 6), DType::F32, &Device::Cpu).unwrap();
        assert_eq!(mlp.forward(&xs, false).unwrap().dims(), &[4, 1]);

        let names: Vec<String> = varmap.data().lock().unwrap().keys().cloned().collect();
        assert_eq!(names.len(), 6);
        assert!(names.contains(&"head.2.weight".to_string()));
    }

    #[test]
    fn scatter_sum_adds_rows_per_bucket() {
        let dev = Device::Cpu;
        let src = Tensor::new(&[[1f32, 2.0], [3.0, 4.0], [10.0, 20.0]], &dev).unwrap();

        let sums = scatter_sum(&src, &[0, 0, 2], 3).unwrap();
        assert_eq!(
            sums.to_vec2::<f32>().unwrap(),
            vec![vec![4.0, 6.0], vec![0.0, 0.0], vec![10.0, 20.0]]
        );
    }

    #[test]
    fn batchify_pads_groups_and_builds_mask() {
        let dev = Device::Cpu;
        let src = Tensor::new(&[[1f32], [2.0], [3.0]], &dev).unwrap();
        let (padded, mask) = batchify(&src, &[0, 2, 2], 3).unwrap();

        assert_eq!(padded.dims(), &[3, 2, 1]);
        assert_eq!(
            mask.to_vec2::<f32>().unwrap(),
            vec![vec![1.0, 0.0], vec![0.0, 0.0], vec![1.0, 1.0]]
        );
        assert_eq!(
            padded.squeeze(2).unwrap().to_vec2::<f32>().unwrap()[2],
            vec![2.0, 3.0]
        );
    }

    #[test]
    fn reassemble_restores_row_order() {
        let dev = Device::Cpu;
        let even = Tensor::new(&[[0f32], [2.0]], &dev).unwrap();
        let odd = Tensor::new(&[[1f32], [3.0]], &dev).unwrap();
        let rows0: &[u32] = &[0, 2];
        let rows1: &[u32] = &[1, 3];
        let out = reassemble(&[(rows0, even), (rows1, odd)], 4, 1, &dev).unwrap();
        assert_eq!(
            out.squeeze(1).unwrap().to_vec1::<f32>().unwrap(),
            vec![0.0, 1.0, 2.0, 3.0]
        );
    }
}
