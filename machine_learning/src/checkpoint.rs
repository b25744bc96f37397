//! Model checkpoints.
//!
//! A checkpoint is a little-endian stream: the `i32` amount of layers followed, for every
//! layer, by its `i32` output size, `i32` input size and `i32` activation code, its
//! `output * input` row-major `f32` weights and its `output` `f32` biases. There is no
//! version tag nor checksum, the header is trusted.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use rand::rngs::StdRng;

use crate::{
    MlErr, Result,
    arch::{Backend, Buffer, Layer, Network, activations::ActFn},
    logging::TraceLevel,
};

impl Network {
    /// Writes every layer's topology and parameters into `writer`.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_size(writer, self.layers().len())?;

        for layer in self.layers() {
            write_size(writer, layer.output_size())?;
            write_size(writer, layer.input_size())?;
            writer.write_all(&layer.act_fn().code().to_le_bytes())?;
            write_values(writer, layer.weights())?;
            write_values(writer, layer.biases())?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Saves the network into a file at `path`, truncating it if it exists.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)
    }

    /// Reads a network back from `reader`.
    ///
    /// The network's input size is the first layer's. Training settings, such as the loss
    /// function and the optimizer, are not part of a checkpoint and start at their defaults.
    ///
    /// # Arguments
    /// * `reader` - Where the checkpoint is read from.
    /// * `backend` - The kernel the loaded network computes with.
    /// * `trace` - How much the loaded network logs.
    /// * `rng` - The generator for any layer added afterwards.
    pub fn load<R: Read>(
        reader: &mut R,
        backend: Backend,
        trace: TraceLevel,
        rng: StdRng,
    ) -> Result<Network> {
        let count = read_size(reader)?;
        if count == 0 {
            return Err(MlErr::InvalidTopology("checkpoint without layers"));
        }

        let mut layers = Vec::new();
        for index in 0..count {
            let output_size = read_size(reader)?;
            let input_size = read_size(reader)?;
            let act_fn = ActFn::from_code(read_i32(reader)?)?;

            let weights = read_values(reader, output_size, input_size)?;
            let biases = read_values(reader, 1, output_size)?;
            layers.push(Layer::from_parts(index, weights, biases, act_fn, trace)?);
        }

        let input_size = layers.first().map_or(0, Layer::input_size);
        let mut network = Network::new(input_size, backend, trace, rng);
        for layer in layers {
            network.push_layer(layer)?;
        }

        Ok(network)
    }

    /// Loads a network from the file at `path`.
    pub fn load_from_path<P: AsRef<Path>>(
        path: P,
        backend: Backend,
        trace: TraceLevel,
        rng: StdRng,
    ) -> Result<Network> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::load(&mut reader, backend, trace, rng)
    }
}

fn write_size<W: Write>(writer: &mut W, size: usize) -> Result<()> {
    let size = i32::try_from(size)
        .map_err(|_| MlErr::DomainError("size does not fit in a checkpoint"))?;

    writer.write_all(&size.to_le_bytes())?;
    Ok(())
}

fn write_values<W: Write>(writer: &mut W, buffer: &Buffer) -> Result<()> {
    for x in buffer.iter() {
        writer.write_all(&x.to_le_bytes())?;
    }

    Ok(())
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut bytes = [0; 4];
    reader.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

fn read_size<R: Read>(reader: &mut R) -> Result<usize> {
    let size = read_i32(reader)?;
    usize::try_from(size).map_err(|_| MlErr::DomainError("negative size in checkpoint"))
}

fn read_values<R: Read>(reader: &mut R, rows: usize, cols: usize) -> Result<Buffer> {
    let len = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(size_of::<f32>()))
        .ok_or(MlErr::DomainError("checkpoint layer too large"))?;

    // The header is trusted for the shape only, the stream has to hold the bytes.
    let mut bytes = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }

    let values = bytes
        .chunks_exact(size_of::<f32>())
        .map(|chunk| {
            let mut word = [0; 4];
            word.copy_from_slice(chunk);
            f32::from_le_bytes(word)
        })
        .collect();

    Buffer::from_shape_vec(rows, cols, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn load(bytes: Vec<u8>) -> Result<Network> {
        Network::load(
            &mut Cursor::new(bytes),
            Backend::Reference,
            TraceLevel::Off,
            rng(),
        )
    }

    fn header(words: &[i32]) -> Vec<u8> {
        words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    #[test]
    fn layout_is_little_endian_header_then_params() {
        let mut network = Network::new(2, Backend::Reference, TraceLevel::Off, rng());
        network.add_layer(1, ActFn::sigmoid()).unwrap();
        network.set_uniform_weights(0.5);
        network.set_uniform_biases(-1.);

        let mut bytes = Vec::new();
        network.save(&mut bytes).unwrap();

        let mut expected = Vec::new();
        for word in [1i32, 1, 2, 1] {
            expected.extend(word.to_le_bytes());
        }
        for value in [0.5f32, 0.5, -1.] {
            expected.extend(value.to_le_bytes());
        }
        assert_eq!(bytes, expected);
    }

    #[test]
    fn round_trip_keeps_topology_and_params() {
        let mut network = Network::new(3, Backend::Optimized, TraceLevel::Off, rng());
        network.add_layer(4, ActFn::relu(0.01)).unwrap();
        network.add_layer(2, ActFn::softmax()).unwrap();

        let mut bytes = Vec::new();
        network.save(&mut bytes).unwrap();
        let loaded = load(bytes).unwrap();

        assert_eq!(loaded.input_size(), 3);
        assert_eq!(loaded.layers().len(), 2);
        for (a, b) in network.layers().iter().zip(loaded.layers()) {
            assert_eq!(a.weights(), b.weights());
            assert_eq!(a.biases(), b.biases());
            assert_eq!(a.act_fn().code(), b.act_fn().code());
        }
    }

    #[test]
    fn truncated_and_invalid_streams_fail() {
        let truncated = vec![2u8, 0, 0, 0, 1, 0];
        assert!(matches!(load(truncated), Err(MlErr::Io(_))));

        let bad_code = header(&[1, 1, 1, 9]);
        assert!(matches!(
            load(bad_code),
            Err(MlErr::InvalidActivationCode(9))
        ));

        let empty = header(&[0]);
        assert!(matches!(load(empty), Err(MlErr::InvalidTopology(_))));
    }

    #[test]
    fn oversized_header_on_a_short_stream_is_an_io_error() {
        let mut bytes = header(&[1, i32::MAX, i32::MAX, 1]);
        bytes.extend(1f32.to_le_bytes());

        assert!(matches!(load(bytes), Err(MlErr::Io(_))));
    }
}
