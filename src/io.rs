//! Matrix/vector file I/O (§4.11, §6), grounded in `original_source/core/src/io.c`.
//!
//! Every format round-trips through plain `Read`/`Write` so callers can
//! point it at a file, a `Vec<u8>` cursor, or a network stream alike.
//! Reads that hit EOF early or find data that doesn't parse as a number
//! return [`SolverError::ParseError`]; anything the underlying reader/writer
//! itself reports comes back as [`SolverError::Io`].

use crate::error::{Result, SolverError};
use crate::matrix::{Bsr, Coo, Csr, StorageManner, Str};
use crate::types::{Index, Precision};
use std::io::{BufRead, Write};

fn parse_error(format: &str, message: impl Into<String>) -> SolverError {
    SolverError::ParseError { format: format.to_string(), message: message.into() }
}

/// Whitespace/newline-delimited token reader, the way `fscanf("%d")` treats a file.
struct Tokens<'a> {
    words: std::str::SplitAsciiWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self { words: text.split_ascii_whitespace() }
    }

    fn next_str(&mut self, format: &str) -> Result<&'a str> {
        self.words.next().ok_or_else(|| parse_error(format, "unexpected end of input"))
    }

    fn next_usize(&mut self, format: &str) -> Result<usize> {
        let tok = self.next_str(format)?;
        tok.parse().map_err(|_| parse_error(format, format!("expected an integer, found '{tok}'")))
    }

    fn next_i64(&mut self, format: &str) -> Result<i64> {
        let tok = self.next_str(format)?;
        tok.parse().map_err(|_| parse_error(format, format!("expected an integer, found '{tok}'")))
    }

    fn next_real(&mut self, format: &str) -> Result<Precision> {
        let tok = self.next_str(format)?;
        tok.parse().map_err(|_| parse_error(format, format!("expected a real number, found '{tok}'")))
    }
}

fn read_all(r: &mut dyn BufRead) -> Result<String> {
    let mut s = String::new();
    std::io::Read::read_to_string(r, &mut s)?;
    Ok(s)
}

/// Format 1: plain CSR text (`nrow`, `IA` 1-based on disk, `JA` 1-based, `val`).
pub fn read_csr(r: &mut dyn BufRead) -> Result<Csr> {
    let text = read_all(r)?;
    let mut t = Tokens::new(&text);
    let n = t.next_usize("csr")?;
    let ia: Vec<Index> = (0..=n).map(|_| t.next_i64("csr").map(|v| (v - 1) as Index)).collect::<Result<_>>()?;
    let nnz = *ia.last().unwrap() as usize;
    let ja: Vec<Index> = (0..nnz).map(|_| t.next_i64("csr").map(|v| (v - 1) as Index)).collect::<Result<_>>()?;
    let val: Vec<Precision> = (0..nnz).map(|_| t.next_real("csr")).collect::<Result<_>>()?;
    Csr::try_new(n, n, ia, ja, val)
}

/// Format 1 writer: 1-based `IA`/`JA` on disk, one value per line.
pub fn write_csr(w: &mut dyn Write, a: &Csr) -> Result<()> {
    writeln!(w, "{}", a.row)?;
    for v in &a.ia {
        writeln!(w, "{}", v + 1)?;
    }
    for v in &a.ja {
        writeln!(w, "{}", v + 1)?;
    }
    for v in &a.val {
        writeln!(w, "{v:.15e}")?;
    }
    Ok(())
}

/// Format 2: CSR, then a trailing `nrow` + `b` values, in one file.
pub fn read_csr_vec(r: &mut dyn BufRead) -> Result<(Csr, Vec<Precision>)> {
    let text = read_all(r)?;
    let mut t = Tokens::new(&text);
    let n = t.next_usize("csr+rhs")?;
    let ia: Vec<Index> = (0..=n).map(|_| t.next_i64("csr+rhs").map(|v| (v - 1) as Index)).collect::<Result<_>>()?;
    let nnz = *ia.last().unwrap() as usize;
    let ja: Vec<Index> = (0..nnz).map(|_| t.next_i64("csr+rhs").map(|v| (v - 1) as Index)).collect::<Result<_>>()?;
    let val: Vec<Precision> = (0..nnz).map(|_| t.next_real("csr+rhs")).collect::<Result<_>>()?;
    let a = Csr::try_new(n, n, ia, ja, val)?;

    let bn = t.next_usize("csr+rhs")?;
    if bn != n {
        return Err(parse_error("csr+rhs", format!("rhs size {bn} does not match matrix size {n}")));
    }
    let b: Vec<Precision> = (0..bn).map(|_| t.next_real("csr+rhs")).collect::<Result<_>>()?;
    Ok((a, b))
}

/// Format 2 writer.
pub fn write_csr_vec(w: &mut dyn Write, a: &Csr, b: &[Precision]) -> Result<()> {
    write_csr(w, a)?;
    writeln!(w, "{}", b.len())?;
    for v in b {
        writeln!(w, "{v:.15e}")?;
    }
    Ok(())
}

/// Format 3: COO `i j a_ij` triples, 0-based indices on disk.
pub fn read_coo(r: &mut dyn BufRead) -> Result<Csr> {
    let text = read_all(r)?;
    let mut t = Tokens::new(&text);
    let row = t.next_usize("coo")?;
    let col = t.next_usize("coo")?;
    let nnz = t.next_usize("coo")?;
    let mut triplets = Vec::with_capacity(nnz);
    for _ in 0..nnz {
        let i = t.next_usize("coo")?;
        let j = t.next_usize("coo")?;
        let v = t.next_real("coo")?;
        triplets.push((i, j, v));
    }
    Coo::from_triplets(row, col, triplets).to_csr()
}

/// Format 3 writer.
pub fn write_coo(w: &mut dyn Write, a: &Csr) -> Result<()> {
    writeln!(w, "{} {} {}", a.row, a.col, a.nnz())?;
    for i in 0..a.row {
        for (j, v) in a.row_entries(i) {
            writeln!(w, "{i} {j} {v:.15e}")?;
        }
    }
    Ok(())
}

/// Format 4: MatrixMarket general, 1-based indices on disk.
pub fn read_matrix_market(r: &mut dyn BufRead) -> Result<Csr> {
    let text = read_all(r)?;
    let mut t = Tokens::new(&text);
    let row = t.next_usize("matrixmarket")?;
    let col = t.next_usize("matrixmarket")?;
    let nnz = t.next_usize("matrixmarket")?;
    let mut triplets = Vec::with_capacity(nnz);
    for _ in 0..nnz {
        let i = t.next_usize("matrixmarket")? - 1;
        let j = t.next_usize("matrixmarket")? - 1;
        let v = t.next_real("matrixmarket")?;
        triplets.push((i, j, v));
    }
    Coo::from_triplets(row, col, triplets).to_csr()
}

/// Format 4 writer (general form, 1-based indices, one triple per line).
pub fn write_matrix_market(w: &mut dyn Write, a: &Csr) -> Result<()> {
    writeln!(w, "{} {} {}", a.row, a.col, a.nnz())?;
    for i in 0..a.row {
        for (j, v) in a.row_entries(i) {
            writeln!(w, "{} {} {v:.15e}", i + 1, j + 1)?;
        }
    }
    Ok(())
}

/// Format 4, symmetric variant: only lower-triangle entries on disk; the
/// diagonal is kept once and every off-diagonal is mirrored, matching
/// `fasp_dmtxsym_read`'s `nnz = 2*(nnz_file - m) + m` expansion.
pub fn read_matrix_market_symmetric(r: &mut dyn BufRead) -> Result<Csr> {
    let text = read_all(r)?;
    let mut t = Tokens::new(&text);
    let row = t.next_usize("matrixmarket-sym")?;
    let col = t.next_usize("matrixmarket-sym")?;
    let nnz_file = t.next_usize("matrixmarket-sym")?;
    let mut triplets = Vec::with_capacity(2 * nnz_file);
    for _ in 0..nnz_file {
        let i = t.next_usize("matrixmarket-sym")? - 1;
        let j = t.next_usize("matrixmarket-sym")? - 1;
        let v = t.next_real("matrixmarket-sym")?;
        triplets.push((i, j, v));
        if i != j {
            triplets.push((j, i, v));
        }
    }
    Coo::from_triplets(row, col, triplets).to_csr()
}

/// Format 4 symmetric writer: emit the lower triangle only.
pub fn write_matrix_market_symmetric(w: &mut dyn Write, a: &Csr) -> Result<()> {
    let mut nnz = 0;
    for i in 0..a.row {
        nnz += a.row_entries(i).filter(|&(j, _)| j <= i).count();
    }
    writeln!(w, "{} {} {}", a.row, a.col, nnz)?;
    for i in 0..a.row {
        for (j, v) in a.row_entries(i) {
            if j <= i {
                writeln!(w, "{} {} {v:.15e}", i + 1, j + 1)?;
            }
        }
    }
    Ok(())
}

/// Format 5: structured grid format (`nx ny nz`, `nc`, `nband`, diagonal,
/// then `offset length` + values per band), grounded in `fasp_dstr_read`.
pub fn read_structured(r: &mut dyn BufRead) -> Result<Str> {
    let text = read_all(r)?;
    let mut t = Tokens::new(&text);
    let nx = t.next_usize("structured")?;
    let ny = t.next_usize("structured")?;
    let nz = t.next_usize("structured")?;
    let nc = t.next_usize("structured")?;
    let nband = t.next_usize("structured")?;

    let diag_len = t.next_usize("structured")?;
    let diag: Vec<Precision> = (0..diag_len).map(|_| t.next_real("structured")).collect::<Result<_>>()?;

    let mut offsets = Vec::with_capacity(nband);
    let mut offdiag = Vec::with_capacity(nband);
    for _ in 0..nband {
        let offset = t.next_i64("structured")?;
        let len = t.next_usize("structured")?;
        offsets.push(offset);
        offdiag.push((0..len).map(|_| t.next_real("structured")).collect::<Result<Vec<_>>>()?);
    }

    Str::try_new(nx, ny, nz, nc, offsets, diag, offdiag)
}

/// Format 5 writer.
pub fn write_structured(w: &mut dyn Write, a: &Str) -> Result<()> {
    writeln!(w, "{} {} {}", a.nx, a.ny, a.nz)?;
    writeln!(w, "{}", a.nc)?;
    writeln!(w, "{}", a.offsets.len())?;
    writeln!(w, "{}", a.diag.len())?;
    for v in &a.diag {
        writeln!(w, "{v:.15e}")?;
    }
    for (offset, band) in a.offsets.iter().zip(a.offdiag.iter()) {
        writeln!(w, "{} {}", offset, band.len())?;
        for v in band {
            writeln!(w, "{v:.15e}")?;
        }
    }
    Ok(())
}

/// Format 6: BSR (`ROW COL NNZ`, `nb`, `storage_manner`, then `IA`/`JA`/`val`).
pub fn read_bsr(r: &mut dyn BufRead) -> Result<Bsr> {
    let text = read_all(r)?;
    let mut t = Tokens::new(&text);
    let row = t.next_usize("bsr")?;
    let col = t.next_usize("bsr")?;
    let nnz = t.next_usize("bsr")?;
    let nb = t.next_usize("bsr")?;
    let storage_manner = match t.next_usize("bsr")? {
        0 => StorageManner::RowMajor,
        1 => StorageManner::ColMajor,
        other => return Err(parse_error("bsr", format!("unknown storage_manner {other}"))),
    };

    let ia_len = t.next_usize("bsr")?;
    let ia: Vec<Index> = (0..ia_len).map(|_| t.next_i64("bsr").map(|v| v as Index)).collect::<Result<_>>()?;
    let ja_len = t.next_usize("bsr")?;
    let ja: Vec<Index> = (0..ja_len).map(|_| t.next_i64("bsr").map(|v| v as Index)).collect::<Result<_>>()?;
    let val_len = t.next_usize("bsr")?;
    let val: Vec<Precision> = (0..val_len).map(|_| t.next_real("bsr")).collect::<Result<_>>()?;

    if ja_len != nnz {
        return Err(parse_error("bsr", format!("JA length {ja_len} does not match declared NNZ {nnz}")));
    }
    Bsr::try_new(row, col, nb, storage_manner, ia, ja, val)
}

/// Format 6 writer.
pub fn write_bsr(w: &mut dyn Write, a: &Bsr) -> Result<()> {
    let storage_code = match a.storage_manner {
        StorageManner::RowMajor => 0,
        StorageManner::ColMajor => 1,
    };
    writeln!(w, "{} {} {}", a.row, a.col, a.nnz_blocks())?;
    writeln!(w, "{}", a.nb)?;
    writeln!(w, "{storage_code}")?;
    writeln!(w, "{}", a.ia.len())?;
    for v in &a.ia {
        writeln!(w, "{v}")?;
    }
    writeln!(w, "{}", a.ja.len())?;
    for v in &a.ja {
        writeln!(w, "{v}")?;
    }
    writeln!(w, "{}", a.val.len())?;
    for v in &a.val {
        writeln!(w, "{v:.15e}")?;
    }
    Ok(())
}

/// Format 7: dense vector, either plain (`n` then `n` values) or indexed
/// (`n` then `index value` pairs, all other entries implicitly zero).
pub fn read_vector(r: &mut dyn BufRead) -> Result<Vec<Precision>> {
    let text = read_all(r)?;
    let mut t = Tokens::new(&text);
    let n = t.next_usize("vector")?;
    let mut v = vec![0.0; n];
    for slot in v.iter_mut() {
        *slot = t.next_real("vector")?;
    }
    Ok(v)
}

/// Format 7 writer (plain form).
pub fn write_vector(w: &mut dyn Write, v: &[Precision]) -> Result<()> {
    writeln!(w, "{}", v.len())?;
    for x in v {
        writeln!(w, "{x:.15e}")?;
    }
    Ok(())
}

/// Format 7, indexed variant: `n` entries, each an `index value` pair.
pub fn read_vector_indexed(r: &mut dyn BufRead) -> Result<Vec<(usize, Precision)>> {
    let text = read_all(r)?;
    let mut t = Tokens::new(&text);
    let n = t.next_usize("vector-indexed")?;
    (0..n)
        .map(|_| {
            let idx = t.next_usize("vector-indexed")?;
            let val = t.next_real("vector-indexed")?;
            Ok((idx, val))
        })
        .collect()
}

/// Format 7 indexed writer.
pub fn write_vector_indexed(w: &mut dyn Write, entries: &[(usize, Precision)]) -> Result<()> {
    writeln!(w, "{}", entries.len())?;
    for (idx, val) in entries {
        writeln!(w, "{idx} {val:.15e}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn small_csr() -> Csr {
        Coo::from_triplets(3, 3, vec![(0, 0, 4.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 4.0), (1, 2, -1.0), (2, 1, -1.0), (2, 2, 4.0)])
            .to_csr()
            .unwrap()
    }

    #[test]
    fn csr_round_trips() {
        let a = small_csr();
        let mut buf = Vec::new();
        write_csr(&mut buf, &a).unwrap();
        let mut cur = Cursor::new(buf);
        let back = read_csr(&mut cur).unwrap();
        assert_eq!(a.row, back.row);
        for i in 0..a.row {
            for (j, v) in a.row_entries(i) {
                assert_eq!(back.get(i, j), Some(v));
            }
        }
    }

    #[test]
    fn csr_vec_round_trips() {
        let a = small_csr();
        let b = vec![1.0, 2.0, 3.0];
        let mut buf = Vec::new();
        write_csr_vec(&mut buf, &a, &b).unwrap();
        let mut cur = Cursor::new(buf);
        let (back_a, back_b) = read_csr_vec(&mut cur).unwrap();
        assert_eq!(back_a.row, a.row);
        assert_eq!(back_b, b);
    }

    #[test]
    fn coo_round_trips() {
        let a = small_csr();
        let mut buf = Vec::new();
        write_coo(&mut buf, &a).unwrap();
        let mut cur = Cursor::new(buf);
        let back = read_coo(&mut cur).unwrap();
        assert_eq!(back.nnz(), a.nnz());
        assert_eq!(back.get(0, 1), a.get(0, 1));
    }

    #[test]
    fn matrix_market_round_trips() {
        let a = small_csr();
        let mut buf = Vec::new();
        write_matrix_market(&mut buf, &a).unwrap();
        let mut cur = Cursor::new(buf);
        let back = read_matrix_market(&mut cur).unwrap();
        assert_eq!(back.get(1, 2), a.get(1, 2));
    }

    #[test]
    fn matrix_market_symmetric_round_trips() {
        let a = small_csr();
        let mut buf = Vec::new();
        write_matrix_market_symmetric(&mut buf, &a).unwrap();
        let mut cur = Cursor::new(buf);
        let back = read_matrix_market_symmetric(&mut cur).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(back.get(i, j), a.get(i, j));
            }
        }
    }

    #[test]
    fn structured_round_trips() {
        let a = Str::try_new(3, 1, 1, 1, vec![1, -1], vec![2.0, 2.0, 2.0], vec![vec![-1.0, -1.0], vec![-1.0, -1.0]]).unwrap();
        let mut buf = Vec::new();
        write_structured(&mut buf, &a).unwrap();
        let mut cur = Cursor::new(buf);
        let back = read_structured(&mut cur).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn bsr_round_trips() {
        let a = Bsr::try_new(2, 2, 2, StorageManner::RowMajor, vec![0, 1, 2], vec![0, 1], vec![1.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 2.0]).unwrap();
        let mut buf = Vec::new();
        write_bsr(&mut buf, &a).unwrap();
        let mut cur = Cursor::new(buf);
        let back = read_bsr(&mut cur).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn vector_round_trips() {
        let v = vec![1.5, -2.25, 3.0];
        let mut buf = Vec::new();
        write_vector(&mut buf, &v).unwrap();
        let mut cur = Cursor::new(buf);
        let back = read_vector(&mut cur).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn vector_indexed_round_trips() {
        let entries = vec![(0, 1.0), (4, 2.5)];
        let mut buf = Vec::new();
        write_vector_indexed(&mut buf, &entries).unwrap();
        let mut cur = Cursor::new(buf);
        let back = read_vector_indexed(&mut cur).unwrap();
        assert_eq!(back, entries);
    }

    #[test]
    fn malformed_input_reports_parse_error() {
        let mut cur = Cursor::new(b"not-a-number".to_vec());
        let err = read_csr(&mut cur).unwrap_err();
        assert!(matches!(err, SolverError::ParseError { .. }));
    }
}
