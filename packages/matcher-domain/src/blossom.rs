//! Maximum weight matching in general graphs (Edmonds' blossom algorithm with
//! primal-dual updates, O(n^3)).
//!
//! Vertices are `0..vertex_count`. Edges are `(i, j, weight)` with `i != j`; each
//! edge `k` owns the endpoint slots `2k` (vertex `i`) and `2k + 1` (vertex `j`),
//! and `mate`/`label_end` hold endpoint slots rather than vertices. Blossom ids
//! live in `vertex_count..2 * vertex_count`.
//!
//! With integer weights every dual stays integral, so the arithmetic is exact.

const NIL: usize = usize::MAX;

const FREE: u8 = 0;
const OUTER: u8 = 1;
const INNER: u8 = 2;
const SCANNED: u8 = 4;

/// Returns, for each vertex, the vertex it is matched to.
///
/// With `max_cardinality` set, only maximum-cardinality matchings are considered.
pub(crate) fn max_weight_matching(
	vertex_count: usize,
	edges: &[(usize, usize, i64)],
	max_cardinality: bool,
) -> Vec<Option<usize>> {
	if edges.is_empty() {
		return vec![None; vertex_count];
	}

	let mut solver = Solver::new(vertex_count, edges);

	solver.solve(max_cardinality);
	solver.mates()
}

struct Solver<'a> {
	edges: &'a [(usize, usize, i64)],
	vertex_count: usize,
	endpoint: Vec<usize>,
	neighbour_ends: Vec<Vec<usize>>,
	mate: Vec<usize>,
	label: Vec<u8>,
	label_end: Vec<usize>,
	in_blossom: Vec<usize>,
	blossom_parent: Vec<usize>,
	blossom_children: Vec<Vec<usize>>,
	blossom_base: Vec<usize>,
	blossom_endpoints: Vec<Vec<usize>>,
	best_edge: Vec<usize>,
	blossom_best_edges: Vec<Option<Vec<usize>>>,
	unused_blossoms: Vec<usize>,
	dual: Vec<i64>,
	allow_edge: Vec<bool>,
	queue: Vec<usize>,
}
impl<'a> Solver<'a> {
	fn new(vertex_count: usize, edges: &'a [(usize, usize, i64)]) -> Self {
		let n = edges
			.iter()
			.map(|&(i, j, _)| i.max(j) + 1)
			.max()
			.unwrap_or(0)
			.max(vertex_count);
		let max_weight = edges.iter().map(|&(_, _, w)| w).max().unwrap_or(0).max(0);
		let endpoint = (0..2 * edges.len())
			.map(|p| if p % 2 == 0 { edges[p / 2].0 } else { edges[p / 2].1 })
			.collect();
		let mut neighbour_ends = vec![Vec::new(); n];

		for (k, &(i, j, _)) in edges.iter().enumerate() {
			neighbour_ends[i].push(2 * k + 1);
			neighbour_ends[j].push(2 * k);
		}

		Self {
			edges,
			vertex_count: n,
			endpoint,
			neighbour_ends,
			mate: vec![NIL; n],
			label: vec![FREE; 2 * n],
			label_end: vec![NIL; 2 * n],
			in_blossom: (0..n).collect(),
			blossom_parent: vec![NIL; 2 * n],
			blossom_children: vec![Vec::new(); 2 * n],
			blossom_base: (0..n).chain(std::iter::repeat_n(NIL, n)).collect(),
			blossom_endpoints: vec![Vec::new(); 2 * n],
			best_edge: vec![NIL; 2 * n],
			blossom_best_edges: vec![None; 2 * n],
			unused_blossoms: (n..2 * n).collect(),
			dual: std::iter::repeat_n(max_weight, n).chain(std::iter::repeat_n(0, n)).collect(),
			allow_edge: vec![false; edges.len()],
			queue: Vec::new(),
		}
	}

	fn mates(&self) -> Vec<Option<usize>> {
		self.mate
			.iter()
			.take(self.vertex_count)
			.map(|&p| (p != NIL).then(|| self.endpoint[p]))
			.collect()
	}

	fn slack(&self, k: usize) -> i64 {
		let (i, j, weight) = self.edges[k];

		self.dual[i] + self.dual[j] - 2 * weight
	}

	fn blossom_leaves(&self, b: usize) -> Vec<usize> {
		let mut leaves = Vec::new();
		let mut stack = vec![b];

		while let Some(t) = stack.pop() {
			if t < self.vertex_count {
				leaves.push(t);
			} else {
				stack.extend(self.blossom_children[t].iter().rev());
			}
		}

		leaves
	}

	fn assign_label(&mut self, w: usize, t: u8, p: usize) {
		let b = self.in_blossom[w];

		self.label[w] = t;
		self.label[b] = t;
		self.label_end[w] = p;
		self.label_end[b] = p;
		self.best_edge[w] = NIL;
		self.best_edge[b] = NIL;

		if t == OUTER {
			let leaves = self.blossom_leaves(b);

			self.queue.extend(leaves);
		} else if t == INNER {
			let mate = self.mate[self.blossom_base[b]];
			let next = self.endpoint[mate];

			self.assign_label(next, OUTER, mate ^ 1);
		}
	}

	/// Walks back from `v` and `w` towards their roots. Returns the base of the
	/// new blossom, or `NIL` when the walk found an augmenting path.
	fn scan_blossom(&mut self, mut v: usize, mut w: usize) -> usize {
		let mut path = Vec::new();
		let mut base = NIL;

		while v != NIL {
			let mut b = self.in_blossom[v];

			if self.label[b] & SCANNED != 0 {
				base = self.blossom_base[b];

				break;
			}

			path.push(b);

			self.label[b] = OUTER | SCANNED;

			if self.label_end[b] == NIL {
				v = NIL;
			} else {
				v = self.endpoint[self.label_end[b]];
				b = self.in_blossom[v];
				v = self.endpoint[self.label_end[b]];
			}
			if w != NIL {
				std::mem::swap(&mut v, &mut w);
			}
		}

		for b in path {
			self.label[b] = OUTER;
		}

		base
	}

	fn add_blossom(&mut self, base: usize, k: usize) {
		let (v, w, _) = self.edges[k];
		let bb = self.in_blossom[base];
		let mut bv = self.in_blossom[v];
		let mut bw = self.in_blossom[w];
		let b = self.unused_blossoms.pop().expect("a graph never holds more blossoms than vertices");
		let mut path = Vec::new();
		let mut endps = Vec::new();

		self.blossom_base[b] = base;
		self.blossom_parent[b] = NIL;
		self.blossom_parent[bb] = b;

		while bv != bb {
			self.blossom_parent[bv] = b;
			path.push(bv);
			endps.push(self.label_end[bv]);

			bv = self.in_blossom[self.endpoint[self.label_end[bv]]];
		}

		path.push(bb);
		path.reverse();
		endps.reverse();
		endps.push(2 * k);

		while bw != bb {
			self.blossom_parent[bw] = b;
			path.push(bw);
			endps.push(self.label_end[bw] ^ 1);

			bw = self.in_blossom[self.endpoint[self.label_end[bw]]];
		}

		self.label[b] = OUTER;
		self.label_end[b] = self.label_end[bb];
		self.dual[b] = 0;
		self.blossom_children[b] = path.clone();
		self.blossom_endpoints[b] = endps;

		for leaf in self.blossom_leaves(b) {
			if self.label[self.in_blossom[leaf]] == INNER {
				self.queue.push(leaf);
			}

			self.in_blossom[leaf] = b;
		}

		let mut best_edge_to = vec![NIL; 2 * self.vertex_count];

		for &child in &path {
			let edge_lists: Vec<Vec<usize>> = match self.blossom_best_edges[child].take() {
				Some(list) => vec![list],
				None => self
					.blossom_leaves(child)
					.into_iter()
					.map(|leaf| self.neighbour_ends[leaf].iter().map(|p| p / 2).collect())
					.collect(),
			};

			for k in edge_lists.into_iter().flatten() {
				let (i, j, _) = self.edges[k];
				let far = if self.in_blossom[j] == b { i } else { j };
				let bj = self.in_blossom[far];

				if bj != b
					&& self.label[bj] == OUTER
					&& (best_edge_to[bj] == NIL || self.slack(k) < self.slack(best_edge_to[bj]))
				{
					best_edge_to[bj] = k;
				}
			}

			self.best_edge[child] = NIL;
		}

		let best: Vec<usize> = best_edge_to.into_iter().filter(|&k| k != NIL).collect();

		self.best_edge[b] = NIL;

		for &k in &best {
			if self.best_edge[b] == NIL || self.slack(k) < self.slack(self.best_edge[b]) {
				self.best_edge[b] = k;
			}
		}

		self.blossom_best_edges[b] = Some(best);
	}

	fn expand_blossom(&mut self, b: usize, end_stage: bool) {
		let children = self.blossom_children[b].clone();

		for &s in &children {
			self.blossom_parent[s] = NIL;

			if s < self.vertex_count {
				self.in_blossom[s] = s;
			} else if end_stage && self.dual[s] == 0 {
				self.expand_blossom(s, end_stage);
			} else {
				for leaf in self.blossom_leaves(s) {
					self.in_blossom[leaf] = s;
				}
			}
		}

		// Mid-stage expansion of an inner blossom: relabel the children along the
		// even-length path from the entry child back to the base.
		if !end_stage && self.label[b] == INNER {
			let endps = self.blossom_endpoints[b].clone();
			let len = children.len() as isize;
			let at = |j: isize| j.rem_euclid(len) as usize;
			let entry_child = self.in_blossom[self.endpoint[self.label_end[b] ^ 1]];
			let mut j = children.iter().position(|&c| c == entry_child).unwrap_or(0) as isize;
			let (step, trick): (isize, usize) = if j & 1 == 1 {
				j -= len;

				(1, 0)
			} else {
				(-1, 1)
			};
			let mut p = self.label_end[b];

			while j != 0 {
				let entry = self.endpoint[p ^ 1];
				let forward = endps[at(j - trick as isize)];

				self.label[entry] = FREE;
				self.label[self.endpoint[forward ^ trick ^ 1]] = FREE;
				self.assign_label(entry, INNER, p);
				self.allow_edge[forward / 2] = true;

				j += step;
				p = endps[at(j - trick as isize)] ^ trick;
				self.allow_edge[p / 2] = true;
				j += step;
			}

			let base_child = children[at(j)];
			let entry = self.endpoint[p ^ 1];

			self.label[entry] = INNER;
			self.label[base_child] = INNER;
			self.label_end[entry] = p;
			self.label_end[base_child] = p;
			self.best_edge[base_child] = NIL;

			j += step;

			while children[at(j)] != entry_child {
				let child = children[at(j)];

				if self.label[child] == OUTER {
					j += step;

					continue;
				}

				let reached =
					self.blossom_leaves(child).into_iter().find(|&leaf| self.label[leaf] != FREE);

				if let Some(leaf) = reached {
					let mate_end = self.endpoint[self.mate[self.blossom_base[child]]];

					self.label[leaf] = FREE;
					self.label[mate_end] = FREE;

					let end = self.label_end[leaf];

					self.assign_label(leaf, INNER, end);
				}

				j += step;
			}
		}

		self.label[b] = FREE;
		self.label_end[b] = NIL;
		self.blossom_children[b].clear();
		self.blossom_endpoints[b].clear();
		self.blossom_base[b] = NIL;
		self.blossom_best_edges[b] = None;
		self.best_edge[b] = NIL;
		self.unused_blossoms.push(b);
	}

	/// Flips the matched edges along the even path from vertex `v` to the base of `b`.
	fn augment_blossom(&mut self, b: usize, v: usize) {
		let mut t = v;

		while self.blossom_parent[t] != b {
			t = self.blossom_parent[t];
		}

		if t >= self.vertex_count {
			self.augment_blossom(t, v);
		}

		let mut children = self.blossom_children[b].clone();
		let mut endps = self.blossom_endpoints[b].clone();
		let len = children.len() as isize;
		let at = |j: isize| j.rem_euclid(len) as usize;
		let i = children.iter().position(|&c| c == t).unwrap_or(0);
		let mut j = i as isize;
		let (step, trick): (isize, usize) = if i & 1 == 1 {
			j -= len;

			(1, 0)
		} else {
			(-1, 1)
		};

		while j != 0 {
			j += step;

			let child = children[at(j)];
			let p = endps[at(j - trick as isize)] ^ trick;

			if child >= self.vertex_count {
				self.augment_blossom(child, self.endpoint[p]);
			}

			j += step;

			let child = children[at(j)];

			if child >= self.vertex_count {
				self.augment_blossom(child, self.endpoint[p ^ 1]);
			}

			self.mate[self.endpoint[p]] = p ^ 1;
			self.mate[self.endpoint[p ^ 1]] = p;
		}

		children.rotate_left(i);
		endps.rotate_left(i);

		self.blossom_base[b] = self.blossom_base[children[0]];
		self.blossom_children[b] = children;
		self.blossom_endpoints[b] = endps;
	}

	fn augment_matching(&mut self, k: usize) {
		let (v, w, _) = self.edges[k];

		for (start, start_end) in [(v, 2 * k + 1), (w, 2 * k)] {
			let mut s = start;
			let mut p = start_end;

			loop {
				let bs = self.in_blossom[s];

				if bs >= self.vertex_count {
					self.augment_blossom(bs, s);
				}

				self.mate[s] = p;

				if self.label_end[bs] == NIL {
					break;
				}

				let t = self.endpoint[self.label_end[bs]];
				let bt = self.in_blossom[t];
				let bt_end = self.label_end[bt];
				let j = self.endpoint[bt_end ^ 1];

				s = self.endpoint[bt_end];

				if bt >= self.vertex_count {
					self.augment_blossom(bt, j);
				}

				self.mate[j] = bt_end;
				p = bt_end ^ 1;
			}
		}
	}

	fn solve(&mut self, max_cardinality: bool) {
		let n = self.vertex_count;

		for _ in 0..n {
			self.label.fill(FREE);
			self.best_edge.fill(NIL);
			self.allow_edge.fill(false);
			self.queue.clear();

			for slot in &mut self.blossom_best_edges[n..] {
				*slot = None;
			}
			for v in 0..n {
				if self.mate[v] == NIL && self.label[self.in_blossom[v]] == FREE {
					self.assign_label(v, OUTER, NIL);
				}
			}

			let mut augmented = false;

			loop {
				while !augmented {
					let Some(v) = self.queue.pop() else {
						break;
					};

					augmented = self.scan_vertex(v);
				}

				if augmented {
					break;
				}

				match self.next_delta(max_cardinality) {
					Delta::Done => break,
					Delta::Edge(k) => {
						let (i, j, _) = self.edges[k];

						self.allow_edge[k] = true;
						self.queue.push(if self.label[self.in_blossom[i]] == FREE { j } else { i });
					},
					Delta::OuterEdge(k) => {
						self.allow_edge[k] = true;
						self.queue.push(self.edges[k].0);
					},
					Delta::Expand(b) => self.expand_blossom(b, false),
				}
			}

			if !augmented {
				break;
			}

			for b in n..2 * n {
				if self.blossom_parent[b] == NIL
					&& self.blossom_base[b] != NIL
					&& self.label[b] == OUTER
					&& self.dual[b] == 0
				{
					self.expand_blossom(b, true);
				}
			}
		}
	}

	/// Grows the alternating forest from outer vertex `v`. Returns true once an
	/// augmentation happened.
	fn scan_vertex(&mut self, v: usize) -> bool {
		for idx in 0..self.neighbour_ends[v].len() {
			let p = self.neighbour_ends[v][idx];
			let k = p / 2;
			let w = self.endpoint[p];

			if self.in_blossom[v] == self.in_blossom[w] {
				continue;
			}

			let mut k_slack = 0;

			if !self.allow_edge[k] {
				k_slack = self.slack(k);

				if k_slack <= 0 {
					self.allow_edge[k] = true;
				}
			}

			if self.allow_edge[k] {
				if self.label[self.in_blossom[w]] == FREE {
					self.assign_label(w, INNER, p ^ 1);
				} else if self.label[self.in_blossom[w]] == OUTER {
					let base = self.scan_blossom(v, w);

					if base != NIL {
						self.add_blossom(base, k);
					} else {
						self.augment_matching(k);

						return true;
					}
				} else if self.label[w] == FREE {
					self.label[w] = INNER;
					self.label_end[w] = p ^ 1;
				}
			} else if self.label[self.in_blossom[w]] == OUTER {
				let b = self.in_blossom[v];

				if self.best_edge[b] == NIL || k_slack < self.slack(self.best_edge[b]) {
					self.best_edge[b] = k;
				}
			} else if self.label[w] == FREE
				&& (self.best_edge[w] == NIL || k_slack < self.slack(self.best_edge[w]))
			{
				self.best_edge[w] = k;
			}
		}

		false
	}

	/// Picks the smallest dual adjustment that keeps every slack non-negative,
	/// applies it, and reports what it unlocked.
	fn next_delta(&mut self, max_cardinality: bool) -> Delta {
		let n = self.vertex_count;
		let min_vertex_dual = self.dual[..n].iter().copied().min().unwrap_or(0);
		let mut choice: Option<(i64, Delta)> =
			(!max_cardinality).then_some((min_vertex_dual, Delta::Done));

		for v in 0..n {
			if self.label[self.in_blossom[v]] == FREE && self.best_edge[v] != NIL {
				let d = self.slack(self.best_edge[v]);

				if choice.as_ref().is_none_or(|(delta, _)| d < *delta) {
					choice = Some((d, Delta::Edge(self.best_edge[v])));
				}
			}
		}
		for b in 0..2 * n {
			if self.blossom_parent[b] == NIL && self.label[b] == OUTER && self.best_edge[b] != NIL
			{
				let d = self.slack(self.best_edge[b]) / 2;

				if choice.as_ref().is_none_or(|(delta, _)| d < *delta) {
					choice = Some((d, Delta::OuterEdge(self.best_edge[b])));
				}
			}
		}
		for b in n..2 * n {
			if self.blossom_base[b] != NIL
				&& self.blossom_parent[b] == NIL
				&& self.label[b] == INNER
				&& choice.as_ref().is_none_or(|(delta, _)| self.dual[b] < *delta)
			{
				choice = Some((self.dual[b], Delta::Expand(b)));
			}
		}

		// Only reachable with `max_cardinality`: no further augmentation exists.
		let (delta, kind) = choice.unwrap_or((min_vertex_dual.max(0), Delta::Done));

		for v in 0..n {
			match self.label[self.in_blossom[v]] {
				OUTER => self.dual[v] -= delta,
				INNER => self.dual[v] += delta,
				_ => {},
			}
		}
		for b in n..2 * n {
			if self.blossom_base[b] != NIL && self.blossom_parent[b] == NIL {
				match self.label[b] {
					OUTER => self.dual[b] += delta,
					INNER => self.dual[b] -= delta,
					_ => {},
				}
			}
		}

		kind
	}
}

enum Delta {
	/// A vertex dual reached zero; the current matching is optimal.
	Done,
	/// An edge between an outer and a free vertex became tight.
	Edge(usize),
	/// An edge between two outer blossoms became tight.
	OuterEdge(usize),
	/// An inner blossom's dual reached zero and must be expanded.
	Expand(usize),
}
